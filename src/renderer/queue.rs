// renderer/queue.rs
use std::sync::Mutex;

use crate::renderer::command_buffer::CommandBuffer;

/// Thread-safe FIFO between recording and execution. Producers push
/// finished buffers from any thread; the present thread drains the whole
/// queue once per frame. Both sides hold the lock only for the push/swap.
#[derive(Default)]
pub struct PendingCommandQueue {
    pending: Mutex<Vec<CommandBuffer>>,
}

impl PendingCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a finished buffer for execution. Buffers execute in
    /// dispatch-call order, not completion order.
    pub fn dispatch(&self, buffer: CommandBuffer) {
        self.pending.lock().unwrap().push(buffer);
    }

    /// Take every pending buffer, leaving the queue empty.
    pub fn drain(&self) -> Vec<CommandBuffer> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue() {
        let queue = PendingCommandQueue::new();
        queue.dispatch(CommandBuffer::new());
        queue.dispatch(CommandBuffer::new());
        assert_eq!(queue.len(), 2);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_preserves_dispatch_order() {
        let queue = PendingCommandQueue::new();
        for i in 0..4u32 {
            let mut cmd = CommandBuffer::new();
            cmd.set_scissor(crate::renderer::resources::ScissorRect {
                x: i,
                y: 0,
                width: 1,
                height: 1,
            });
            queue.dispatch(cmd);
        }
        let drained = queue.drain();
        for (i, cmd) in drained.iter().enumerate() {
            match cmd.commands()[0] {
                crate::renderer::command_buffer::GpuCommand::SetScissor(rect) => {
                    assert_eq!(rect.x, i as u32)
                }
                _ => panic!("unexpected command"),
            }
        }
    }
}
