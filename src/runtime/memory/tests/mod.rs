//! Frame arena unit tests

use crate::runtime::errors::FrameError;
use crate::runtime::memory::{FrameAllocator, FrameArena, FrameEvent};
use crate::runtime::task::Continuation;
use crate::util::config::ArenaConfig;

fn traced_arena() -> FrameArena {
    FrameArena::with_config(&ArenaConfig {
        trace_events: true,
        ..ArenaConfig::default()
    })
}

#[cfg(test)]
mod allocate_tests {
    use super::*;

    #[test]
    fn test_arena_new_is_empty() {
        let arena = FrameArena::new();
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.top(), None);
        assert_eq!(arena.stats().allocations, 0);
    }

    #[test]
    fn test_allocate_zeroed_and_aligned() {
        let mut arena = FrameArena::new();
        let id = arena.allocate(20).unwrap();
        let frame = arena.get(id).unwrap();
        assert_eq!(frame.payload().len(), 32);
        assert!(frame.payload().iter().all(|&b| b == 0));
        assert_eq!(frame.parent(), None);
        assert!(!frame.has_resume());
        assert_eq!(arena.stats().bytes_live, 32);
    }

    #[test]
    fn test_payload_is_preserved() {
        let mut arena = FrameArena::new();
        let id = arena.allocate(16).unwrap();
        arena.get_mut(id).unwrap().payload_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        let _other = arena.allocate(8).unwrap();
        assert_eq!(&arena.get(id).unwrap().payload()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_allocate_linked_sets_chain() {
        let mut arena = FrameArena::new();
        let parent = arena.allocate(0).unwrap();
        let resume = Continuation::new("noop", |_, _, _| Ok(()));
        let child = arena.allocate_linked(8, Some(parent), Some(resume)).unwrap();
        let frame = arena.get(child).unwrap();
        assert_eq!(frame.parent(), Some(parent));
        assert!(frame.has_resume());
    }

    #[test]
    fn test_frame_limit() {
        let mut arena = FrameArena::with_config(&ArenaConfig {
            max_live_frames: Some(2),
            ..ArenaConfig::default()
        });
        let _a = arena.allocate(8).unwrap();
        let b = arena.allocate(8).unwrap();
        assert_eq!(
            arena.allocate(8),
            Err(FrameError::Exhausted { limit: 2 })
        );
        assert_eq!(arena.stats().allocations, 2);
        assert_eq!(arena.top(), Some(b));

        arena.release(b).unwrap();
        assert!(arena.allocate(8).is_ok());
    }

    #[test]
    fn test_oversized_frame() {
        let mut arena = FrameArena::new();
        assert_eq!(
            arena.allocate(usize::MAX),
            Err(FrameError::Oversized(usize::MAX))
        );
        assert_eq!(arena.live(), 0);
    }
}

#[cfg(test)]
mod release_tests {
    use super::*;

    #[test]
    fn test_release_lifo() {
        let mut arena = traced_arena();
        let a = arena.allocate(8).unwrap();
        let b = arena.allocate(8).unwrap();
        arena.release(b).unwrap();
        arena.release(a).unwrap();

        assert_eq!(arena.live(), 0);
        let stats = arena.stats();
        assert_eq!(stats.allocations, stats.releases);
        assert_eq!(stats.peak_live, 2);
        assert_eq!(stats.bytes_live, 0);
        assert_eq!(
            arena.events().unwrap(),
            &[
                FrameEvent::Allocated { frame: a, size: 16 },
                FrameEvent::Allocated { frame: b, size: 16 },
                FrameEvent::Released { frame: b },
                FrameEvent::Released { frame: a },
            ]
        );
    }

    #[test]
    fn test_release_out_of_order_is_rejected() {
        let mut arena = FrameArena::new();
        let a = arena.allocate(8).unwrap();
        let b = arena.allocate(8).unwrap();
        assert_eq!(
            arena.release(a),
            Err(FrameError::OutOfOrder {
                released: a,
                top: Some(b),
            })
        );
        assert!(arena.contains(a));
        assert_eq!(arena.live(), 2);
    }

    #[test]
    fn test_double_release_is_rejected() {
        let mut arena = FrameArena::new();
        let a = arena.allocate(8).unwrap();
        arena.release(a).unwrap();
        assert_eq!(arena.release(a), Err(FrameError::InvalidHandle(a)));
        assert_eq!(arena.stats().releases, 1);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut arena = FrameArena::new();
        let old = arena.allocate(8).unwrap();
        arena.release(old).unwrap();
        let new = arena.allocate(8).unwrap();

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert!(!arena.contains(old));
        assert!(arena.get(old).is_err());
        assert!(arena.contains(new));
    }

    #[test]
    fn test_events_disabled_by_default() {
        let mut arena = FrameArena::new();
        let a = arena.allocate(8).unwrap();
        arena.release(a).unwrap();
        assert!(arena.events().is_none());
    }
}

#[cfg(test)]
mod unlink_tests {
    use super::*;

    #[test]
    fn test_unlink_takes_resume_once() {
        let mut arena = FrameArena::new();
        let parent = arena.allocate(0).unwrap();
        let child = arena.allocate(0).unwrap();
        arena
            .link(child, parent, Continuation::new("noop", |_, _, _| Ok(())))
            .unwrap();

        let (got_parent, _resume) = arena.unlink(child).unwrap();
        assert_eq!(got_parent, parent);
        assert!(matches!(
            arena.unlink(child),
            Err(FrameError::MissingResume(f)) if f == child
        ));
    }

    #[test]
    fn test_unlink_without_parent() {
        let mut arena = FrameArena::new();
        let root = arena.allocate(0).unwrap();
        assert!(matches!(
            arena.unlink(root),
            Err(FrameError::MissingParent(f)) if f == root
        ));
    }

    #[test]
    fn test_detach_out_of_order_keeps_links() {
        let mut arena = traced_arena();
        let parent = arena.allocate(0).unwrap();
        let child = arena.allocate(0).unwrap();
        arena
            .link(child, parent, Continuation::new("noop", |_, _, _| Ok(())))
            .unwrap();
        let newer = arena.allocate(0).unwrap();

        assert!(matches!(
            arena.detach(child),
            Err(FrameError::OutOfOrder { released, top }) if released == child && top == Some(newer)
        ));
        assert!(arena.get(child).unwrap().has_resume());
        assert_eq!(arena.get(child).unwrap().parent(), Some(parent));

        arena.release(newer).unwrap();
        let (got_parent, _resume) = arena.detach(child).unwrap();
        assert_eq!(got_parent, parent);
        assert!(!arena.contains(child));
        assert_eq!(arena.top(), Some(parent));
    }

    #[test]
    fn test_detach_stale_handle() {
        let mut arena = FrameArena::new();
        let frame = arena.allocate(0).unwrap();
        arena.release(frame).unwrap();
        assert_eq!(arena.detach(frame).unwrap_err(), FrameError::InvalidHandle(frame));
    }
}
