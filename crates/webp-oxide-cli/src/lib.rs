pub mod commands;
pub mod decode;
pub mod error;
pub mod info;
mod output;

pub use commands::{Args, Subcommands};
pub use error::Error;

type Result<T> = std::result::Result<T, Error>;

fn create_thread_pool(num_threads: Option<usize>) -> webp_oxide::WebpThreadPool {
    match num_threads {
        Some(num_threads) => webp_oxide::WebpThreadPool::with_num_threads(num_threads),
        None => webp_oxide::WebpThreadPool::default(),
    }
}
