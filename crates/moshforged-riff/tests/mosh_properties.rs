//! Integration tests for the fragment mutation policy

use moshforged_riff::{
    is_payload_fragment, mosh, mosh_file, riff::walk_tree, ChunkWalker, Error, FourCc, MoshParams,
    RiffBuilder,
};

/// Payload for fragment `i`, distinct per fragment and long enough to corrupt.
fn frame(i: u8, len: usize) -> Vec<u8> {
    (0..len).map(|j| i.wrapping_mul(31).wrapping_add(j as u8)).collect()
}

/// hdrl, a movi list interleaving 6 video and 3 audio fragments, idx1.
fn sample_avi() -> Vec<u8> {
    RiffBuilder::new()
        .list(FourCc::HDRL, |l| {
            l.chunk(b"avih", &[0u8; 56])
                .list(FourCc::STRL, |s| s.chunk(b"strh", &[1u8; 56]))
        })
        .chunk(b"JUNK", &[0u8; 13])
        .list(FourCc::MOVI, |mut l| {
            for i in 0..6u8 {
                l = l.chunk(b"00dc", &frame(i, 40 + i as usize));
                if i % 2 == 1 {
                    l = l.chunk(b"01wb", &[0xAA; 16]);
                }
            }
            l
        })
        .chunk(b"idx1", &[0u8; 32])
        .finish()
}

/// Raw bytes of every chunk directly inside the first movi list.
fn movi_children(data: &[u8]) -> Vec<(FourCc, Vec<u8>)> {
    let movi = ChunkWalker::new(data, 12, data.len())
        .find(|c| c.list_type() == Some(FourCc::MOVI))
        .expect("movi list");
    movi.children(data)
        .map(|c| (c.fourcc, c.bytes(data).to_vec()))
        .collect()
}

fn video_fragments(data: &[u8]) -> Vec<Vec<u8>> {
    movi_children(data)
        .into_iter()
        .filter(|(tag, _)| *tag == FourCc(*b"00dc"))
        .map(|(_, bytes)| bytes)
        .collect()
}

/// Walk `start..end` recursively and check that it is well formed: no
/// unparsable bytes, siblings tile the region, and every list's size equals
/// what its children cover. Returns the video fragments found inside movi.
fn check_structure(data: &[u8], start: usize, end: usize, in_movi: bool) -> usize {
    let mut fragments = 0;
    let mut pos = start;
    for chunk in ChunkWalker::new(data, start, end) {
        assert!(!chunk.is_raw_tail(), "unparsable bytes at offset {}", chunk.offset);
        assert_eq!(chunk.offset, pos);
        pos = chunk.span_end;

        match chunk.list_type() {
            Some(list_type) => {
                let covered: usize = chunk.children(data).map(|c| c.span_end - c.offset).sum();
                assert_eq!(
                    chunk.declared_size as usize,
                    4 + covered,
                    "LIST '{}' at offset {}",
                    list_type,
                    chunk.offset
                );
                fragments += check_structure(
                    data,
                    chunk.payload_offset + 4,
                    chunk.payload_end(),
                    in_movi || list_type == FourCc::MOVI,
                );
            }
            None if in_movi && is_payload_fragment(chunk.fourcc) => fragments += 1,
            None => {}
        }
    }
    assert_eq!(pos, end, "chunks stop short of the region end");
    fragments
}

fn duplicate(count: u32) -> MoshParams {
    MoshParams {
        intensity: 0.5,
        duplicate_fragments: true,
        duplication_count: count,
        ..Default::default()
    }
}

fn remove() -> MoshParams {
    MoshParams {
        intensity: 0.5,
        remove_fragments: true,
        ..Default::default()
    }
}

#[test]
fn test_header_preserved_for_all_policies() {
    let input = sample_avi();
    for params in [MoshParams::default(), duplicate(3), remove()] {
        let output = mosh(&input, &params).unwrap();
        assert_eq!(&output.data[..12], &input[..12], "{:?}", params);
    }
}

#[test]
fn test_noop_is_byte_identical() {
    let input = sample_avi();
    let output = mosh(&input, &MoshParams::passthrough(0.9)).unwrap();
    assert_eq!(output.data, input);
    assert_eq!(output.stats.fragments, 6);
}

#[test]
fn test_duplication_count_law() {
    let input = sample_avi();
    let originals = video_fragments(&input);
    let n = 5usize;

    let output = mosh(&input, &duplicate(n as u32)).unwrap();
    let children = movi_children(&output.data);

    // Walk the output: each even-position fragment is followed by n copies.
    let mut idx = 0;
    for (i, original) in originals.iter().enumerate() {
        while children[idx].0 != FourCc(*b"00dc") {
            idx += 1;
        }
        assert_eq!(&children[idx].1, original, "fragment {}", i);
        idx += 1;
        if i % 2 == 0 {
            for _ in 0..n {
                let (tag, bytes) = &children[idx];
                assert_eq!(*tag, FourCc(*b"00dc"));
                assert_eq!(bytes.len(), original.len());
                idx += 1;
            }
        }
    }
    assert_eq!(video_fragments(&output.data).len(), 6 + 3 * n);
}

#[test]
fn test_corruption_placement() {
    let input = sample_avi();
    let originals = video_fragments(&input);
    let n = 7usize;

    let output = mosh(&input, &duplicate(n as u32)).unwrap();
    let fragments = video_fragments(&output.data);

    // Fragment 0 and its copies occupy the first n+1 slots.
    let original = &originals[0];
    for i in 0..n {
        let copy = &fragments[1 + i];
        if i % 3 == 0 {
            assert_ne!(copy, original, "copy {} should be corrupted", i);
            for (pos, (a, b)) in copy.iter().zip(original.iter()).enumerate() {
                if a != b {
                    // Differences only inside the payload window [16, 50).
                    let payload_pos = pos - 8;
                    assert!((16..50).contains(&payload_pos) && (payload_pos - 16) % 4 == 0);
                    assert_eq!(*a, ((*b as u16 + 127) % 255) as u8);
                }
            }
        } else {
            assert_eq!(copy, original, "copy {} should be intact", i);
        }
    }
}

#[test]
fn test_short_fragments_are_never_corrupted() {
    let input = RiffBuilder::new()
        .list(FourCc::MOVI, |l| l.chunk(b"00dc", &[9u8; 20]).chunk(b"00dc", &[8u8; 20]))
        .finish();

    let output = mosh(&input, &duplicate(6)).unwrap();
    let fragments = video_fragments(&output.data);
    assert_eq!(fragments.len(), 8);
    for copy in &fragments[..7] {
        assert_eq!(copy, &fragments[0]);
    }
    assert_eq!(output.stats.corrupted_copies, 0);
}

#[test]
fn test_removal_law() {
    let input = sample_avi();
    let originals = video_fragments(&input);

    let output = mosh(&input, &remove()).unwrap();
    let kept = video_fragments(&output.data);
    assert_eq!(kept, vec![originals[1].clone(), originals[3].clone(), originals[5].clone()]);

    // Audio fragments and structural chunks are untouched.
    let audio: Vec<_> = movi_children(&output.data)
        .into_iter()
        .filter(|(tag, _)| *tag == FourCc(*b"01wb"))
        .collect();
    assert_eq!(audio.len(), 3);

    let before: Vec<String> = walk_tree(&input)
        .unwrap()
        .into_iter()
        .filter(|c| !c.payload_fragment && c.depth == 0)
        .map(|c| c.fourcc)
        .collect();
    let after: Vec<String> = walk_tree(&output.data)
        .unwrap()
        .into_iter()
        .filter(|c| !c.payload_fragment && c.depth == 0)
        .map(|c| c.fourcc)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_output_is_structurally_valid() {
    let input = sample_avi();
    assert_eq!(check_structure(&input, 12, input.len(), false), 6);

    let both = MoshParams {
        remove_fragments: true,
        duplicate_fragments: true,
        duplication_count: 4,
        ..Default::default()
    };
    for (params, expected) in [(remove(), 3), (duplicate(1), 9), (duplicate(3), 15), (both, 3)] {
        let output = mosh(&input, &params).unwrap();
        let found = check_structure(&output.data, 12, output.data.len(), false);
        assert_eq!(found, expected, "{:?}", params);
        assert_eq!(video_fragments(&output.data).len(), expected);

        let tags: Vec<FourCc> = ChunkWalker::new(&output.data, 12, output.data.len())
            .map(|c| c.fourcc)
            .collect();
        assert_eq!(tags, vec![FourCc::LIST, FourCc::JUNK, FourCc::LIST, FourCc::IDX1]);
    }
}

#[test]
fn test_nested_rec_output_is_structurally_valid() {
    // Odd payload lengths so every fragment carries a pad byte.
    let input = RiffBuilder::new()
        .list(FourCc::HDRL, |l| l.chunk(b"avih", &[0u8; 56]))
        .list(FourCc::MOVI, |mut l| {
            for i in 0..4u8 {
                l = l.list(FourCc::REC, |r| {
                    r.chunk(b"00dc", &frame(i, 21 + 2 * i as usize))
                        .chunk(b"01wb", &[0xBB; 5])
                });
            }
            l
        })
        .chunk(b"idx1", &[0u8; 16])
        .finish();
    assert_eq!(check_structure(&input, 12, input.len(), false), 4);

    let output = mosh(&input, &remove()).unwrap();
    assert_eq!(check_structure(&output.data, 12, output.data.len(), false), 2);

    let output = mosh(&input, &duplicate(2)).unwrap();
    assert_eq!(check_structure(&output.data, 12, output.data.len(), false), 8);
    assert_eq!(output.stats.bytes_written as usize, output.data.len());
}

#[test]
fn test_truncation_copies_tail_verbatim() {
    let input = sample_avi();
    // Cut 20 bytes before the end of the last video fragment.
    let cut = input.len() - 40 - 24 - 20;
    let truncated = &input[..cut];

    // The movi list now overruns the file, so it is carried as one raw tail.
    for params in [MoshParams::passthrough(0.0), duplicate(2), remove()] {
        let output = mosh(truncated, &params).unwrap();
        assert_eq!(output.data, truncated);
        assert!(output.stats.raw_tail_bytes > 0);
    }
}

#[test]
fn test_garbage_inside_movi_is_copied_verbatim() {
    let garbage = b"00dc\xff\xff\x00\x00abcd";
    let input = RiffBuilder::new()
        .list(FourCc::MOVI, |l| l.chunk(b"00dc", &frame(0, 32)).raw(garbage))
        .finish();

    let output = mosh(&input, &duplicate(2)).unwrap();
    assert_eq!(output.stats.fragments, 1);
    assert_eq!(output.stats.raw_tail_bytes, garbage.len() as u64);
    assert!(output.data.ends_with(garbage));
    assert_eq!(output.data.len(), input.len() + 2 * (8 + 32));
}

#[test]
fn test_truncated_after_header() {
    let input = sample_avi();
    for cut in [12, 13, 19, 20, 21] {
        let output = mosh(&input[..cut], &duplicate(3)).unwrap();
        assert_eq!(output.data, &input[..cut], "cut at {}", cut);
    }
}

#[test]
fn test_missing_movi_is_copied_verbatim() {
    let input = RiffBuilder::new()
        .list(FourCc::HDRL, |l| l.chunk(b"avih", &[0u8; 56]))
        .chunk(b"00dc", &[3u8; 32])
        .finish();

    let output = mosh(&input, &duplicate(4)).unwrap();
    assert_eq!(output.data, input);
    assert_eq!(output.stats.fragments, 0);
}

#[test]
fn test_legacy_tags_are_mutated() {
    let input = RiffBuilder::new()
        .list(FourCc::MOVI, |l| {
            l.chunk(b"00iv", &[1u8; 24])
                .chunk(b"00vc", &[2u8; 24])
                .chunk(b"01db", &[3u8; 24])
        })
        .finish();

    let output = mosh(&input, &remove()).unwrap();
    assert_eq!(output.stats.fragments, 3);
    assert_eq!(output.stats.dropped, 2);
    let remaining = movi_children(&output.data);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].0, FourCc(*b"00vc"));
}

#[test]
fn test_invalid_header_rejected() {
    let mut input = sample_avi();
    input[8..12].copy_from_slice(b"WAVE");
    assert!(matches!(
        mosh(&input, &MoshParams::default()),
        Err(Error::InvalidHeader(_))
    ));
    assert!(matches!(
        mosh(&input[..8], &MoshParams::default()),
        Err(Error::Truncated { .. })
    ));
}

#[test]
fn test_mosh_file_matches_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.avi");
    let output_path = dir.path().join("output.avi");
    let input = sample_avi();
    std::fs::write(&input_path, &input).unwrap();

    let params = duplicate(4);
    let stats = mosh_file(&input_path, &output_path, &params).unwrap();
    let expected = mosh(&input, &params).unwrap();

    assert_eq!(std::fs::read(&output_path).unwrap(), expected.data);
    assert_eq!(stats, expected.stats);
}
