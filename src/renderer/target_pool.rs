// renderer/target_pool.rs
use std::sync::Arc;

use crate::renderer::backend::RenderBackend;
use crate::renderer::resources::{RenderTarget, RenderTargetDescriptor};

/// Generation-checked index into the temporary-target pool. A handle from
/// a previous frame goes stale when `reclaim` runs; `get` then returns
/// `None` instead of handing back a reused target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    index: u32,
    generation: u32,
}

struct PoolSlot {
    target: Arc<RenderTarget>,
    generation: u32,
    in_use: bool,
}

/// Arena of pooled temporary render targets (cubemap scratch faces,
/// post-process intermediates). Targets stay alive while logically in
/// flight; `reclaim` runs only at the start of `present()`, after the
/// previous frame's queue has fully drained.
#[derive(Default)]
pub struct TargetPool {
    slots: Vec<PoolSlot>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse a free slot with a compatible description, or create a new
    /// target through the backend.
    pub fn acquire(
        &mut self,
        desc: &RenderTargetDescriptor,
        backend: &dyn RenderBackend,
    ) -> (TargetHandle, Arc<RenderTarget>) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.in_use && slot.target.desc.compatible_with(desc) {
                slot.in_use = true;
                let handle = TargetHandle {
                    index: index as u32,
                    generation: slot.generation,
                };
                return (handle, slot.target.clone());
            }
        }

        let target = backend.create_render_target(desc);
        let handle = TargetHandle {
            index: self.slots.len() as u32,
            generation: 0,
        };
        self.slots.push(PoolSlot {
            target: target.clone(),
            generation: 0,
            in_use: true,
        });
        (handle, target)
    }

    pub fn get(&self, handle: TargetHandle) -> Option<&Arc<RenderTarget>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.in_use && slot.generation == handle.generation {
            Some(&slot.target)
        } else {
            None
        }
    }

    /// Free every slot and invalidate outstanding handles.
    pub fn reclaim(&mut self) {
        for slot in &mut self.slots {
            if slot.in_use {
                slot.in_use = false;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::NullBackend;

    #[test]
    fn reclaim_invalidates_handles() {
        let backend = NullBackend::new();
        let mut pool = TargetPool::new();
        let desc = RenderTargetDescriptor::color("scratch", 128, 128);

        let (handle, _) = pool.acquire(&desc, &backend);
        assert!(pool.get(handle).is_some());

        pool.reclaim();
        assert!(pool.get(handle).is_none(), "stale handle must not resolve");
    }

    #[test]
    fn compatible_slots_are_reused_after_reclaim() {
        let backend = NullBackend::new();
        let mut pool = TargetPool::new();
        let desc = RenderTargetDescriptor::color("scratch", 128, 128);

        let (_, first) = pool.acquire(&desc, &backend);
        pool.reclaim();
        let (_, second) = pool.acquire(&desc, &backend);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn incompatible_requests_allocate_new_slots() {
        let backend = NullBackend::new();
        let mut pool = TargetPool::new();
        let (_, _a) = pool.acquire(&RenderTargetDescriptor::color("a", 128, 128), &backend);
        let (_, _b) = pool.acquire(&RenderTargetDescriptor::color("b", 256, 256), &backend);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.in_use(), 2);
    }
}
