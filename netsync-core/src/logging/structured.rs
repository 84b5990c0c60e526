//! Structured logging utilities.
//!
//! Every reconciliation pass gets a short id; log lines emitted while handling
//! a network or VM carry that entity as well.

use std::fmt;

/// Logging context for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub pass_id: String,
    pub network: Option<String>,
    pub vm: Option<String>,
}

impl LogContext {
    pub fn new(pass_id: &str) -> Self {
        Self {
            pass_id: pass_id.to_string(),
            network: None,
            vm: None,
        }
    }

    pub fn with_network(&self, network: &str) -> Self {
        Self {
            pass_id: self.pass_id.clone(),
            network: Some(network.to_string()),
            vm: None,
        }
    }

    pub fn with_vm(&self, vm: &str) -> Self {
        Self {
            pass_id: self.pass_id.clone(),
            network: self.network.clone(),
            vm: Some(vm.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[pass={}]", self.pass_id)?;
        if let Some(network) = &self.network {
            write!(f, " [network={}]", network)?;
        }
        if let Some(vm) = &self.vm {
            write!(f, " [vm={}]", vm)?;
        }
        Ok(())
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::warn!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::error!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::debug!(
            concat!("{} {}" $(, " ", stringify!($key), "={}")*),
            $ctx,
            $event
            $(, $value)*
        )
    };
}
