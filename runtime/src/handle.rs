//! Ownership of the one native interpreter instance
//!
//! The interpreter library keeps process-global state, so at most one
//! instance may be alive at a time. [`NativeHandle`] claims a process-wide
//! slot before creating the instance and gives it back when the instance is
//! destroyed, whichever of `destroy` or `Drop` happens first.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::Engine;
use crate::error::{ErrorCode, GsError, Result};

static INSTANCE_SLOT: AtomicBool = AtomicBool::new(false);

/// True while some handle owns the native instance
pub fn instance_alive() -> bool {
    INSTANCE_SLOT.load(Ordering::SeqCst)
}

/// Owned native instance
pub struct NativeHandle {
    engine: Box<dyn Engine>,
    live: bool,
}

impl NativeHandle {
    /// Claim the instance slot and create the native instance on `engine`
    pub fn create(mut engine: Box<dyn Engine>) -> Result<Self> {
        if INSTANCE_SLOT
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GsError::native(
                ErrorCode::FATAL.0,
                "new_instance: another interpreter instance is already alive",
            ));
        }

        let code = engine.new_instance();
        if code < 0 {
            INSTANCE_SLOT.store(false, Ordering::SeqCst);
            return Err(GsError::native(code, "new_instance"));
        }

        log::debug!("interpreter instance created");
        Ok(Self { engine, live: true })
    }

    /// True until [`NativeHandle::destroy`] has run
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Engine driving this instance
    pub fn engine(&mut self) -> &mut dyn Engine {
        self.engine.as_mut()
    }

    /// Delete the native instance and release the slot; idempotent
    pub fn destroy(&mut self) {
        if !self.live {
            return;
        }
        self.engine.delete_instance();
        self.live = false;
        INSTANCE_SLOT.store(false, Ordering::SeqCst);
        log::debug!("interpreter instance destroyed");
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}
