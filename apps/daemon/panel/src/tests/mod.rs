mod daemon;
mod error;
