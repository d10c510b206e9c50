pub(crate) mod lifecycle;
pub(crate) mod shared;
pub(crate) mod whoami;
