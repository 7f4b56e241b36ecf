mod paths;

pub use paths::{AppPaths, AppPathsError, HOME_ENV};
