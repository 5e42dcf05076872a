mod common;
mod enquiries;
mod routing;
