//! Console trace of the simulation, switched on per thread by CLI flags.

use std::cell::RefCell;

#[derive(Debug, Default, Clone, Copy)]
pub struct Flags {
    /// per-tick transitions
    pub v_option: bool,
    /// queue status after every tick
    pub q_option: bool,
}

thread_local!(pub static TFLAGS: RefCell<Flags> = RefCell::new(Flags::default()));

/// Sets the trace flags of the calling thread (the controller's thread).
pub fn set_flags(flags: Flags) {
    TFLAGS.with(|tflags| *tflags.borrow_mut() = flags);
}

pub fn flags() -> Flags {
    TFLAGS.with(|tflags| *tflags.borrow())
}

// prints the transitions
#[macro_export]
macro_rules! v_trace {
    ($($arg:tt)*) => {
        $crate::trace::TFLAGS.with(|tflags| {
            if tflags.borrow().v_option {
                println!("{}", format_args!($($arg)*));
            }
        });
    };
}

// prints the queues
#[macro_export]
macro_rules! q_trace {
    ($($arg:tt)*) => {
        $crate::trace::TFLAGS.with(|tflags| {
            if tflags.borrow().q_option {
                println!("{}", format_args!($($arg)*));
            }
        });
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_per_thread() {
        set_flags(Flags { v_option: true, q_option: false });
        assert!(flags().v_option);
        let other = std::thread::spawn(|| flags().v_option).join().unwrap();
        assert!(!other);
    }
}
