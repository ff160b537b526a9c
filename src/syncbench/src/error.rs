//! Result codes, per-operation kernel errors, and the harness-level
//! [`BenchError`].
use core::fmt;

/// The macro to define [`ResultCode`].
macro_rules! define_result_code {
    (
        $( #[$meta:meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident = $vd:expr
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta] )*
                $vname = $vd
            ),*
        }

        impl ResultCode {
            /// Get the short name of the result code.
            ///
            /// # Examples
            ///
            /// ```
            /// use syncbench::error::ResultCode;
            /// assert_eq!(ResultCode::QueueOverflow.as_str(), "QueueOverflow");
            /// ```
            pub fn as_str(self) -> &'static str {
                match self {
                    $(
                        Self::$vname => stringify!($vname),
                    )*
                }
            }
        }

        impl fmt::Debug for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Display for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_result_code! {
    /// All result codes (including success) that a kernel operation can
    /// produce. The discriminants follow μITRON4.0's error codes.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(i8)]
    pub enum ResultCode {
        /// The operation was successful.
        Success = 0,
        /// The operation is not supported.
        NotSupported = -9,
        /// A parameter is invalid in a way that is not covered by any other
        /// error codes.
        BadParam = -17,
        /// A specified object handle is invalid.
        BadId = -18,
        /// The kernel ran out of the resources needed to create an object.
        NoResource = -33,
        /// The current context disallows the operation.
        BadContext = -25,
        /// A target object is in a state that disallows the operation.
        BadObjectState = -41,
        /// The target queue or semaphore is full.
        QueueOverflow = -43,
        /// A non-blocking operation could not complete immediately.
        Timeout = -50,
    }
}

impl ResultCode {
    /// Get a flag indicating whether the code represents a failure.
    #[inline]
    pub fn is_err(self) -> bool {
        (self as i8) < 0
    }

    /// Get a flag indicating whether the code represents a success.
    #[inline]
    pub fn is_ok(self) -> bool {
        !self.is_err()
    }
}

macro_rules! define_error {
    (
        mod $mod_name:ident {}
        $( #[$meta:meta] )*
        $vis:vis enum $name:ident {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`ResultCode`] for all result codes and generic descriptions.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i8)]
        $vis enum $name {
            $(
                $( #[$vmeta] )*
                $vname = ResultCode::$vname as i8
            ),*
        }

        impl fmt::Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Debug::fmt(&ResultCode::from(*self), f)
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&ResultCode::from(*self), f)
            }
        }

        impl From<$name> for ResultCode {
            #[inline]
            fn from(x: $name) -> Self {
                match x {
                    $(
                        $name::$vname => Self::$vname,
                    )*
                }
            }
        }

        impl From<Result<(), $name>> for ResultCode {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                match x {
                    Ok(()) => Self::Success,
                    Err(e) => Self::from(e),
                }
            }
        }

        #[cfg(test)]
        mod $mod_name {
            use super::*;

            #[test]
            fn to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname as i8,
                        $name::$vname as i8,
                    );
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from($name::$vname),
                    );
                )*
            }

            #[test]
            fn result_to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from(Err($name::$vname)),
                    );
                )*
                assert_eq!(
                    ResultCode::Success,
                    ResultCode::from(Result::<(), $name>::Ok(())),
                );
            }
        }
    };
}

define_error! {
    mod current_task_error {}
    /// Error type for [`Kernel::current_core`] and
    /// [`Kernel::current_priority`].
    ///
    /// [`Kernel::current_core`]: crate::kernel::Kernel::current_core
    /// [`Kernel::current_priority`]: crate::kernel::Kernel::current_priority
    pub enum CurrentTaskError {
        /// The caller is not a task managed by the kernel.
        BadContext,
    }
}

define_error! {
    mod spawn_task_error {}
    /// Error type for [`Kernel::spawn`].
    ///
    /// [`Kernel::spawn`]: crate::kernel::Kernel::spawn
    pub enum SpawnTaskError {
        /// The caller is not a task managed by the kernel.
        BadContext,
        /// The placement names a nonexistent core, or the stack size is zero.
        BadParam,
        /// The kernel could not allocate the task.
        NoResource,
    }
}

define_error! {
    mod task_state_error {}
    /// Error type for [`Kernel::task_state`].
    ///
    /// [`Kernel::task_state`]: crate::kernel::Kernel::task_state
    pub enum TaskStateError {
        /// The task handle is invalid (the task might have been deleted).
        BadId,
    }
}

define_error! {
    mod suspend_task_error {}
    /// Error type for [`Kernel::suspend_current`].
    ///
    /// [`Kernel::suspend_current`]: crate::kernel::Kernel::suspend_current
    pub enum SuspendTaskError {
        /// The caller is not a task managed by the kernel.
        BadContext,
    }
}

define_error! {
    mod delete_task_error {}
    /// Error type for [`Kernel::delete_task`].
    ///
    /// [`Kernel::delete_task`]: crate::kernel::Kernel::delete_task
    pub enum DeleteTaskError {
        /// The task handle is invalid.
        BadId,
        /// The caller tried to delete itself.
        BadContext,
        /// The task has not suspended itself yet.
        BadObjectState,
    }
}

define_error! {
    mod notify_give_error {}
    /// Error type for [`Kernel::notify_give`].
    ///
    /// [`Kernel::notify_give`]: crate::kernel::Kernel::notify_give
    pub enum NotifyGiveError {
        /// The task handle is invalid.
        BadId,
    }
}

define_error! {
    mod notify_take_error {}
    /// Error type for [`Kernel::notify_take`].
    ///
    /// [`Kernel::notify_take`]: crate::kernel::Kernel::notify_take
    pub enum NotifyTakeError {
        /// The caller is not a task managed by the kernel.
        BadContext,
    }
}

define_error! {
    mod create_object_error {}
    /// Error type for [`Kernel::queue_create`] and
    /// [`Kernel::semaphore_create`].
    ///
    /// [`Kernel::queue_create`]: crate::kernel::Kernel::queue_create
    /// [`Kernel::semaphore_create`]: crate::kernel::Kernel::semaphore_create
    pub enum CreateObjectError {
        /// The capacity is zero, or the initial count exceeds the maximum.
        BadParam,
        /// The kernel could not allocate the object.
        NoResource,
    }
}

define_error! {
    mod object_error {}
    /// Error type for operations that can only fail because of a bad handle,
    /// such as [`Kernel::queue_reset`] and [`Kernel::queue_delete`].
    ///
    /// [`Kernel::queue_reset`]: crate::kernel::Kernel::queue_reset
    /// [`Kernel::queue_delete`]: crate::kernel::Kernel::queue_delete
    pub enum ObjectError {
        /// The object handle is invalid.
        BadId,
    }
}

define_error! {
    mod queue_send_error {}
    /// Error type for [`Kernel::queue_try_send`].
    ///
    /// [`Kernel::queue_try_send`]: crate::kernel::Kernel::queue_try_send
    pub enum QueueSendError {
        /// The queue handle is invalid.
        BadId,
        /// The queue is full.
        QueueOverflow,
    }
}

define_error! {
    mod queue_poll_error {}
    /// Error type for [`Kernel::queue_try_receive`].
    ///
    /// [`Kernel::queue_try_receive`]: crate::kernel::Kernel::queue_try_receive
    pub enum QueuePollError {
        /// The queue handle is invalid.
        BadId,
        /// The queue is empty.
        Timeout,
    }
}

define_error! {
    mod queue_receive_error {}
    /// Error type for [`Kernel::queue_receive`].
    ///
    /// [`Kernel::queue_receive`]: crate::kernel::Kernel::queue_receive
    pub enum QueueReceiveError {
        /// The queue handle is invalid, or the queue was deleted while waiting.
        BadId,
        /// The caller is not a task managed by the kernel.
        BadContext,
    }
}

define_error! {
    mod signal_semaphore_error {}
    /// Error type for [`Kernel::semaphore_signal_one`].
    ///
    /// [`Kernel::semaphore_signal_one`]: crate::kernel::Kernel::semaphore_signal_one
    pub enum SignalSemaphoreError {
        /// The semaphore handle is invalid.
        BadId,
        /// The semaphore already holds its maximum count.
        QueueOverflow,
    }
}

define_error! {
    mod wait_semaphore_error {}
    /// Error type for [`Kernel::semaphore_wait_one`].
    ///
    /// [`Kernel::semaphore_wait_one`]: crate::kernel::Kernel::semaphore_wait_one
    pub enum WaitSemaphoreError {
        /// The semaphore handle is invalid, or it was deleted while waiting.
        BadId,
        /// The caller is not a task managed by the kernel.
        BadContext,
    }
}

/// The failure of a benchmark case.
///
/// All of these are fatal to the case that produced them. Nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchError {
    /// Creating an object or validating the configuration failed. No timing
    /// has taken place.
    Setup {
        what: &'static str,
        code: ResultCode,
    },
    /// A primitive failed although the protocol guarantees it succeeds, or a
    /// protocol invariant was observed broken.
    Operational {
        what: &'static str,
        site: Site,
        code: ResultCode,
    },
    /// Releasing an object failed.
    Teardown {
        what: &'static str,
        code: ResultCode,
    },
    /// Writing the report failed.
    Output,
}

/// Where an operational failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Site {
    pub core: Option<usize>,
    pub round: Option<usize>,
    pub item: Option<usize>,
}

impl Site {
    pub const fn none() -> Self {
        Self {
            core: None,
            round: None,
            item: None,
        }
    }

    pub const fn core(self, core: usize) -> Self {
        Self {
            core: Some(core),
            ..self
        }
    }

    pub const fn round(self, round: usize) -> Self {
        Self {
            round: Some(round),
            ..self
        }
    }

    pub const fn item(self, item: usize) -> Self {
        Self {
            item: Some(item),
            ..self
        }
    }
}

impl BenchError {
    #[inline]
    pub fn setup(what: &'static str, code: impl Into<ResultCode>) -> Self {
        Self::Setup {
            what,
            code: code.into(),
        }
    }

    #[inline]
    pub fn operational(what: &'static str, site: Site, code: impl Into<ResultCode>) -> Self {
        Self::Operational {
            what,
            site,
            code: code.into(),
        }
    }

    #[inline]
    pub fn teardown(what: &'static str, code: impl Into<ResultCode>) -> Self {
        Self::Teardown {
            what,
            code: code.into(),
        }
    }

    /// Get the result code carried by this error, if any.
    pub fn code(&self) -> Option<ResultCode> {
        match *self {
            Self::Setup { code, .. }
            | Self::Operational { code, .. }
            | Self::Teardown { code, .. } => Some(code),
            Self::Output => None,
        }
    }
}

impl From<fmt::Error> for BenchError {
    #[inline]
    fn from(_: fmt::Error) -> Self {
        Self::Output
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sep = "";
        if let Some(core) = self.core {
            write!(f, "core {core}")?;
            sep = ", ";
        }
        if let Some(round) = self.round {
            write!(f, "{sep}round {round}")?;
            sep = ", ";
        }
        if let Some(item) = self.item {
            write!(f, "{sep}item {item}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Setup { what, code } => write!(f, "setup failed: {what} ({code})"),
            Self::Operational { what, site, code } if *site == Site::none() => {
                write!(f, "{what} failed ({code})")
            }
            Self::Operational { what, site, code } => {
                write!(f, "{site}: {what} failed ({code})")
            }
            Self::Teardown { what, code } => write!(f, "teardown failed: {what} ({code})"),
            Self::Output => f.write_str("failed to write the report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn result_code_sign() {
        assert!(ResultCode::Success.is_ok());
        assert!(ResultCode::QueueOverflow.is_err());
        assert!(ResultCode::Timeout.is_err());
    }

    #[test]
    fn operational_message_names_the_site() {
        let e = BenchError::operational(
            "queue send",
            Site::none().core(1).round(3).item(200),
            QueueSendError::QueueOverflow,
        );
        assert_eq!(
            e.to_string(),
            "core 1, round 3, item 200: queue send failed (QueueOverflow)"
        );
        assert_eq!(e.code(), Some(ResultCode::QueueOverflow));
    }

    #[test]
    fn operational_message_without_site() {
        let e = BenchError::operational("queue receive", Site::none(), QueuePollError::Timeout);
        assert_eq!(e.to_string(), "queue receive failed (Timeout)");
    }

    #[test]
    fn setup_message() {
        let e = BenchError::setup("create completion semaphore", CreateObjectError::NoResource);
        assert_eq!(
            e.to_string(),
            "setup failed: create completion semaphore (NoResource)"
        );
    }
}
