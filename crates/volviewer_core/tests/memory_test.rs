//! Integration tests for the arena, growable arrays and streams working together.

use volviewer_core::{Arena, DynArray, Span, Stream};

#[test]
fn test_many_pushes_survive_relocation() {
    let mut arena = Arena::with_capacity(1 << 20).unwrap();
    let mut squares: DynArray<u64> = DynArray::new();
    let mut names: DynArray<Span> = DynArray::new();

    // Interleaving two arrays means neither stays the newest block for long.
    for i in 0..1000u64 {
        squares.push(&mut arena, i * i).unwrap();
        let name = arena
            .stream_commit(|s| {
                s.append_str("item-");
                s.append_u64(i);
            })
            .unwrap();
        names.push(&mut arena, name).unwrap();
    }

    assert_eq!(squares.len(), 1000);
    assert_eq!(names.len(), 1000);
    for (i, value) in squares.as_slice(&arena).iter().enumerate() {
        assert_eq!(*value, (i * i) as u64);
    }
    let last = names.get(&arena, 999).unwrap();
    assert_eq!(arena.str(last), "item-999");
}

#[test]
fn test_scratch_allocations_release_exactly() {
    let mut arena = Arena::with_capacity(4096).unwrap();
    let _ = arena.push_str("persistent").unwrap();
    let before = arena.cursor();

    let total = {
        let mut scratch = arena.scratch();
        let mut total = 0;
        for len in [13usize, 200, 7, 1024, 300] {
            total += scratch.alloc(1, 1, len).unwrap().len;
        }
        assert!(scratch.try_alloc(1, 1, 4096 - before).is_none());
        total
    };

    assert_eq!(arena.cursor(), before);
    assert!(arena.try_alloc(1, 1, total).is_some());
}

#[test]
fn test_stack_stream_builds_paths() {
    let mut buf = [0u8; 24];
    let mut stream = Stream::new(&mut buf);
    stream.append_strs(&["shaders", "/", "render_model.frag.glsl"]);
    assert!(stream.has_error());
    assert_eq!(stream.as_str(), "");

    stream.reset(0);
    stream.append_strs(&["shaders", "/", "lighting.glsl"]);
    assert_eq!(stream.finish().unwrap(), b"shaders/lighting.glsl");
}
