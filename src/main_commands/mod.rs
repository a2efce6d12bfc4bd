pub(crate) mod generate;
pub(crate) mod info;
pub(crate) mod run;
