#[cfg_attr(docsrs, doc(cfg(feature = "link-audit")))]
#[cfg(feature = "link-audit")]
mod audit;

#[cfg(feature = "link-audit")]
pub use audit::Audit;
