mod bypass;
mod failures;
mod properties;
mod streaming;
