use native_bridge::error::{InteropError, PinError};
use native_bridge::managed::{ElementKind, ManagedBuffer};
use native_bridge::pin::{PinMode, Release};
use native_bridge::shim::{finish_or, CallFrame};
use proptest::prelude::*;
use std::ptr::NonNull;

native_bridge::native_functions! {
    enum Calls in "BALANCE" {
        PolyDraw,
    }
}

/// Buffer that counts acquisitions and releases and can refuse to pin
struct Counted {
    data: Vec<u8>,
    fail: bool,
    acquired: usize,
    released: usize,
}

impl Counted {
    fn new(fail: bool) -> Self {
        Self {
            data: vec![0; 16],
            fail,
            acquired: 0,
            released: 0,
        }
    }
}

impl ManagedBuffer for Counted {
    fn element_kind(&self) -> ElementKind {
        ElementKind::Byte
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn pin_direct(&mut self) -> Result<NonNull<u8>, PinError> {
        if self.fail {
            return Err(PinError::TooLarge { bytes: 16, limit: 0 });
        }
        self.acquired += 1;
        Ok(NonNull::new(self.data.as_mut_ptr()).unwrap())
    }

    fn unpin_direct(&mut self) -> Result<(), PinError> {
        self.released += 1;
        Ok(())
    }

    fn copy_out(&mut self, dst: &mut [u8]) -> Result<(), PinError> {
        if self.fail {
            return Err(PinError::SizeMismatch { expected: 16, got: 0 });
        }
        self.acquired += 1;
        dst.copy_from_slice(&self.data);
        Ok(())
    }

    fn copy_in(&mut self, src: &[u8]) -> Result<(), PinError> {
        self.released += 1;
        self.data.copy_from_slice(src);
        Ok(())
    }
}

/// One call with every buffer as an argument; returns whether the native
/// side ran
fn call_with(buffers: &mut [Counted], mode: PinMode) -> bool {
    let mut called = false;
    let result = (|| -> Result<i32, InteropError> {
        let mut frame = CallFrame::new(Calls::PolyDraw);
        for buffer in buffers.iter_mut() {
            frame.pin(Some(buffer), mode, Release::Commit)?;
        }
        called = true;
        let status = frame.invoke(|| 1);
        frame.release_pins()?;
        Ok(status)
    })();
    finish_or(Calls::PolyDraw, 0, result);
    called
}

proptest! {
    #[test]
    fn prop_every_pin_released_once(
        count in 1usize..7,
        fail_at in proptest::option::of(0usize..7),
        critical in any::<bool>(),
    ) {
        let fail_at = fail_at.filter(|&k| k < count);
        let mut buffers: Vec<_> = (0..count).map(|i| Counted::new(Some(i) == fail_at)).collect();
        let mode = if critical { PinMode::Critical } else { PinMode::Relaxed };

        let called = call_with(&mut buffers, mode);

        prop_assert_eq!(called, fail_at.is_none());
        let limit = fail_at.unwrap_or(count);
        for (i, buffer) in buffers.iter().enumerate() {
            let expected = usize::from(i < limit);
            prop_assert_eq!(buffer.acquired, expected, "acquired {}", i);
            prop_assert_eq!(buffer.released, expected, "released {}", i);
        }
    }
}
