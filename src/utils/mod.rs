pub mod debcontrol;
pub mod downloader;
#[cfg(test)]
pub mod testserver;
