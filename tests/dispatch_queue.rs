use std::sync::Arc;
use std::thread;

use drawdeck::renderer::{CommandBuffer, GpuCommand, PendingCommandQueue, ScissorRect};

const THREADS: u32 = 4;
const BUFFERS_PER_THREAD: u32 = 2500;

fn tagged_buffer(thread: u32, sequence: u32) -> CommandBuffer {
    let mut cmd = CommandBuffer::new();
    cmd.set_scissor(ScissorRect {
        x: thread,
        y: sequence,
        width: 1,
        height: 1,
    });
    cmd
}

fn tag(cmd: &CommandBuffer) -> (u32, u32) {
    match cmd.commands()[0] {
        GpuCommand::SetScissor(rect) => (rect.x, rect.y),
        _ => panic!("unexpected command"),
    }
}

#[test]
fn concurrent_dispatch_loses_nothing() {
    let queue = Arc::new(PendingCommandQueue::new());

    let mut handles = Vec::new();
    for thread in 0..THREADS {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for sequence in 0..BUFFERS_PER_THREAD {
                queue.dispatch(tagged_buffer(thread, sequence));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(queue.len(), (THREADS * BUFFERS_PER_THREAD) as usize);

    let drained = queue.drain();
    assert_eq!(drained.len(), (THREADS * BUFFERS_PER_THREAD) as usize);
    assert!(queue.is_empty());

    // Zero loss, zero duplication: every (thread, sequence) pair exactly once.
    let mut seen = vec![vec![0u32; BUFFERS_PER_THREAD as usize]; THREADS as usize];
    for cmd in &drained {
        let (thread, sequence) = tag(cmd);
        seen[thread as usize][sequence as usize] += 1;
    }
    for per_thread in &seen {
        assert!(per_thread.iter().all(|&count| count == 1));
    }
}

#[test]
fn per_producer_order_is_preserved() {
    let queue = Arc::new(PendingCommandQueue::new());

    let mut handles = Vec::new();
    for thread in 0..THREADS {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for sequence in 0..200 {
                queue.dispatch(tagged_buffer(thread, sequence));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Inter-buffer order equals dispatch order, so each producer's buffers
    // appear in strictly increasing sequence.
    let drained = queue.drain();
    let mut last = vec![None::<u32>; THREADS as usize];
    for cmd in &drained {
        let (thread, sequence) = tag(cmd);
        if let Some(previous) = last[thread as usize] {
            assert!(sequence > previous, "thread {thread} reordered");
        }
        last[thread as usize] = Some(sequence);
    }
}
