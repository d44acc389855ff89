use std::sync::Arc;

use webp_oxide::{CancellationToken, DecoderOptions, Error, OutputColorMode, WebpImage};
use webp_oxide_tests as util;

use crate::{encode_lossless_rgba, encode_lossy_rgb, encode_lossy_rgba};

const SIZE: u32 = 256;

fn test_files() -> Vec<(&'static str, Vec<u8>)> {
    let rgb = util::test_image_rgb(SIZE, SIZE);
    let rgba = util::test_image_rgba(SIZE, SIZE);
    vec![
        ("lossy", encode_lossy_rgb(&rgb, SIZE, SIZE, 75.0)),
        ("lossy_alpha", encode_lossy_rgba(&rgba, SIZE, SIZE, 50.0)),
        ("lossless", encode_lossless_rgba(&rgba, SIZE, SIZE)),
    ]
}

#[test]
fn thread_count_independent() {
    for (name, file) in test_files() {
        for mode in util::ALL_COLOR_MODES {
            let single = webp_oxide::decode(&file, &util::options(1, mode)).unwrap();
            let multi = webp_oxide::decode(&file, &util::options(8, mode)).unwrap();
            assert_eq!(single.buf.len(), SIZE as usize * single.stride());
            assert!(single == multi, "{name} differs in {mode:?}");
        }
    }
}

#[test]
fn shared_options() {
    let (_, file) = test_files().swap_remove(0);
    let options = util::options(4, OutputColorMode::Rgba);
    let expected = webp_oxide::decode(&file, &options).unwrap();

    let file = Arc::new(file);
    let handles = (0..4)
        .map(|_| {
            let file = Arc::clone(&file);
            let options = options.clone();
            std::thread::spawn(move || webp_oxide::decode(&file, &options).unwrap())
        })
        .collect::<Vec<_>>();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn pre_cancelled() {
    for (name, file) in test_files() {
        let token = CancellationToken::new();
        token.cancel();
        let options = DecoderOptions::builder()
            .max_worker_threads(4)
            .cancellation(token)
            .build();

        // Headers are still available.
        let image = WebpImage::parse(&file, &options).unwrap();
        assert_eq!(image.width(), SIZE);
        let err = image.decode().unwrap_err();
        assert!(matches!(err, Error::Cancelled), "{name}: {err}");
    }
}

#[test]
fn cancel_while_decoding() {
    let (_, file) = test_files().swap_remove(0);
    let token = CancellationToken::new();
    let options = DecoderOptions::builder()
        .max_worker_threads(2)
        .cancellation(token.clone())
        .build();
    let image = WebpImage::parse(&file, &options).unwrap();

    let result = std::thread::scope(|scope| {
        let handle = scope.spawn(|| image.decode());
        token.cancel();
        handle.join().unwrap()
    });
    // The decode may finish before cancellation is observed.
    match result {
        Ok(decoded) => assert_eq!(decoded.width, SIZE),
        Err(err) => assert!(matches!(err, Error::Cancelled), "{err}"),
    }
}
