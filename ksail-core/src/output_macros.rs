//! Output macros for user-facing CLI text.
//!
//! Plain results go to stdout through `ksail_println!`; status lines
//! (success, warnings, progress) go to stderr so that command output stays
//! pipeable. Diagnostics belong to `tracing`, not here.

#[macro_export]
macro_rules! ksail_print {
    ($($arg:tt)*) => {
        print!("{}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! ksail_println {
    () => {
        println!();
    };
    ($($arg:tt)*) => {
        println!("{}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! ksail_error {
    ($($arg:tt)*) => {
        eprintln!("{}", format!($($arg)*));
    }
}

#[macro_export]
macro_rules! ksail_error_hint {
    ($($arg:tt)*) => {
        eprintln!("💡 {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! ksail_success {
    ($($arg:tt)*) => {
        eprintln!("✓ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! ksail_info {
    ($($arg:tt)*) => {
        eprintln!("ℹ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! ksail_warning {
    ($($arg:tt)*) => {
        eprintln!("⚠ {}", format!($($arg)*));
    };
}

#[macro_export]
macro_rules! ksail_progress {
    ($($arg:tt)*) => {
        eprintln!("▶ {}", format!($($arg)*));
    };
}

/// Print the start/success/failure line of a cluster or registry operation
/// using the shared templates in `ksail_messages::categories`.
#[macro_export]
macro_rules! ksail_operation {
    (start $group:ident . $op:ident, name = $name:expr) => {
        $crate::ksail_progress!(
            "{}",
            $crate::messages::msg!($crate::messages::categories::$group.$op.starting, name = $name)
        );
    };
    (success $group:ident . $op:ident, name = $name:expr) => {
        $crate::ksail_success!(
            "{}",
            $crate::messages::msg!($crate::messages::categories::$group.$op.success, name = $name)
        );
    };
    (failed $group:ident . $op:ident, name = $name:expr, error = $error:expr) => {
        $crate::ksail_error!(
            "{}",
            $crate::messages::msg!($crate::messages::categories::$group.$op.failed, name = $name)
        );
        $crate::ksail_error!("   Error: {}", $error);
    };
}
