pub(crate) mod fetch;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod shared;
pub(crate) mod tag;
