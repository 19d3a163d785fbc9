#[cfg(feature = "tracing")]
macro_rules! rvtrace {
    ($($tt:tt)*) => {
        tracing::trace!(target: "roomview", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! rvtrace {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! rvdebug {
    ($($tt:tt)*) => {
        tracing::debug!(target: "roomview", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! rvdebug {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! rvwarn {
    ($($tt:tt)*) => {
        tracing::warn!(target: "roomview", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! rvwarn {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! rverror {
    ($($tt:tt)*) => {
        tracing::error!(target: "roomview", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! rverror {
    ($($tt:tt)*) => {};
}
