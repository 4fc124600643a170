//! Echo plugin
//!
//! A minimal native plugin. Built as a `cdylib`, copied to
//! `<plugins>/echo/echo.so` and loaded by the host like any other module.
//!
//! The session handle is expected to point at an [`EchoBuffer`]; the
//! dispatcher copies the command line it receives into it. A null session
//! is ignored.

use switchplug::plugins::{Dispatcher, SessionHandle};

/// Host-owned buffer the dispatcher writes into.
#[repr(C)]
pub struct EchoBuffer {
    pub calls: usize,
    pub len: usize,
    pub data: [u8; 256],
}

#[derive(Default)]
struct Echo;

impl Echo {
    fn write(raw_args: &str, session: SessionHandle) {
        if session.is_null() {
            return;
        }
        // SAFETY: the host passes a live, exclusively borrowed `EchoBuffer`.
        let buffer = unsafe { &mut *session.as_ptr().cast::<EchoBuffer>() };
        let len = raw_args.len().min(buffer.data.len());
        buffer.data[..len].copy_from_slice(&raw_args.as_bytes()[..len]);
        buffer.len = len;
        buffer.calls += 1;
    }
}

impl Dispatcher for Echo {
    fn api_names(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }

    fn dial_plan_names(&self) -> Vec<String> {
        vec!["echo_app".to_string()]
    }

    fn dispatch_api(&self, raw_args: &str, session: SessionHandle) {
        Self::write(raw_args, session);
    }

    fn dispatch_dial_plan(&self, raw_args: &str, session: SessionHandle) {
        Self::write(raw_args, session);
    }
}

switchplug::export_plugin!(Echo);
