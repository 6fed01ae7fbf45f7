#[cfg(test)]
mod compression_tests {
    use image::{ImageBuffer, Rgb};
    use studio_media_rs::compression::{compress_image, compress_images, ImageCompressor, SIZE_THRESHOLD_BYTES};
    use studio_media_rs::{CompressionError, CompressionProfile, ImageFile, OutputType};

    // Helper: an uncompressed BMP, so the byte size is predictable
    fn create_test_bmp(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([((x + y) % 256) as u8, (x % 256) as u8, (y % 256) as u8])
        });

        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageOutputFormat::Bmp)
            .expect("Failed to encode test BMP");
        buffer
    }

    fn create_test_png() -> Vec<u8> {
        let img = ImageBuffer::from_fn(100, 100, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));

        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageOutputFormat::Png)
            .expect("Failed to encode test PNG");
        buffer
    }

    fn bounded(max_width: u32, max_height: u32) -> CompressionProfile {
        CompressionProfile {
            max_width,
            max_height,
            ..CompressionProfile::default()
        }
    }

    fn decoded_size(file: &ImageFile) -> (u32, u32) {
        let img = image::load_from_memory(&file.data).expect("output should decode");
        (img.width(), img.height())
    }

    #[tokio::test]
    async fn test_small_file_returned_unchanged() {
        let data = create_test_png();
        assert!(data.len() < SIZE_THRESHOLD_BYTES);

        let source = ImageFile::new("ring.png", "image/png", data);
        let out = ImageCompressor::new()
            .compress(source.clone(), &CompressionProfile::default())
            .await
            .unwrap();

        assert_eq!(out, source);
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(out.dimensions, None);
    }

    #[tokio::test]
    async fn test_non_image_rejected() {
        let source = ImageFile::new("notes.txt", "text/plain", vec![b'a'; 600_000]);
        let err = ImageCompressor::new()
            .compress(source, &CompressionProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::InvalidInput(ref t) if t == "text/plain"));
    }

    #[tokio::test]
    async fn test_width_bound_scales_both_axes() {
        let source = ImageFile::new("aisle.bmp", "image/bmp", create_test_bmp(800, 400));
        assert!(source.size() > SIZE_THRESHOLD_BYTES);

        let out = ImageCompressor::new()
            .compress(source.clone(), &bounded(400, 300))
            .await
            .unwrap();

        assert_eq!(out.name, "aisle.bmp");
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(out.dimensions, Some((400, 200)));
        assert_eq!(decoded_size(&out), (400, 200));
        assert!(out.last_modified >= source.last_modified);
    }

    #[tokio::test]
    async fn test_height_bound_only() {
        let source = ImageFile::new("tall.bmp", "image/bmp", create_test_bmp(300, 1000));
        let out = ImageCompressor::new()
            .compress(source, &bounded(400, 300))
            .await
            .unwrap();
        assert_eq!(decoded_size(&out), (90, 300));
    }

    #[tokio::test]
    async fn test_within_bounds_keeps_dimensions() {
        let source = ImageFile::new("hall.bmp", "image/bmp", create_test_bmp(600, 300));
        assert!(source.size() > SIZE_THRESHOLD_BYTES);

        let out = ImageCompressor::new()
            .compress(source.clone(), &CompressionProfile::display())
            .await
            .unwrap();

        assert_eq!(decoded_size(&out), (600, 300));
        assert!(out.size() < source.size());
    }

    #[tokio::test]
    async fn test_png_output_type() {
        let source = ImageFile::new("cake.bmp", "image/bmp", create_test_bmp(800, 400));
        let profile = CompressionProfile {
            output_type: OutputType::Png,
            ..bounded(200, 200)
        };

        let out = ImageCompressor::new().compress(source, &profile).await.unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert!(out.data.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
        assert_eq!(decoded_size(&out), (200, 100));
    }

    #[tokio::test]
    async fn test_quantized_png_and_jpeg_encoder_settings() {
        let source = ImageFile::new("venue.bmp", "image/bmp", create_test_bmp(800, 400));
        let compressor = ImageCompressor::new()
            .with_png_quantize(true)
            .with_jpeg_encoder("jpeg-encoder".parse().unwrap());

        let png = compressor
            .compress(source.clone(), &CompressionProfile { output_type: OutputType::Png, ..bounded(320, 320) })
            .await
            .unwrap();
        assert_eq!(decoded_size(&png), (320, 160));

        let jpeg = compressor.compress(source, &bounded(320, 320)).await.unwrap();
        assert_eq!(&jpeg.data[0..2], &[0xFF, 0xD8]);
        assert_eq!(decoded_size(&jpeg), (320, 160));
    }

    #[tokio::test]
    async fn test_corrupt_image_fails_to_decode() {
        let source = ImageFile::new("broken.jpg", "image/jpeg", vec![0x42u8; 600_000]);
        let err = ImageCompressor::new()
            .compress(source, &CompressionProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::Decode(_)));
    }

    #[tokio::test]
    async fn test_zero_area_target_fails_to_encode() {
        let source = ImageFile::new("strip.bmp", "image/bmp", create_test_bmp(5000, 40));
        assert!(source.size() > SIZE_THRESHOLD_BYTES);

        let err = ImageCompressor::new()
            .compress(source, &bounded(10, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, CompressionError::Encode(_)));
    }

    #[tokio::test]
    async fn test_invalid_profile_rejected() {
        let source = ImageFile::new("ring.png", "image/png", create_test_png());
        let profile = CompressionProfile {
            quality: 0.0,
            ..CompressionProfile::default()
        };
        let err = ImageCompressor::new().compress(source, &profile).await.unwrap_err();
        assert!(matches!(err, CompressionError::InvalidProfile(_)));
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let source = ImageFile::new("ring.png", "image/png", create_test_png());
        let out = ImageCompressor::new()
            .with_size_threshold(0)
            .compress(source, &CompressionProfile::default())
            .await
            .unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(out.dimensions, Some((100, 100)));
    }

    #[tokio::test]
    async fn test_default_profile_when_none_given() {
        let source = ImageFile::new("panorama.bmp", "image/bmp", create_test_bmp(2100, 300));
        let out = compress_image(source, None).await.unwrap();
        // 300 * 1920 / 2100 = 274.29
        assert_eq!(decoded_size(&out), (1920, 274));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let files = vec![
            ImageFile::new("first.bmp", "image/bmp", create_test_bmp(800, 400)),
            ImageFile::new("second.png", "image/png", create_test_png()),
            ImageFile::new("third.bmp", "image/bmp", create_test_bmp(300, 1000)),
        ];

        let out = ImageCompressor::new()
            .compress_many(files, &bounded(400, 300))
            .await
            .unwrap();

        let names: Vec<_> = out.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["first.bmp", "second.png", "third.bmp"]);
        assert_eq!(out[0].dimensions, Some((400, 200)));
        assert_eq!(out[1].mime_type, "image/png");
        assert_eq!(out[2].dimensions, Some((90, 300)));
    }

    #[tokio::test]
    async fn test_batch_fails_as_a_whole() {
        let files = vec![
            ImageFile::new("first.png", "image/png", create_test_png()),
            ImageFile::new("contract.pdf", "application/pdf", vec![0u8; 10]),
            ImageFile::new("third.png", "image/png", create_test_png()),
        ];

        let err = ImageCompressor::new()
            .compress_many(files, &CompressionProfile::gallery())
            .await
            .unwrap_err();

        match err {
            CompressionError::Batch { source } => {
                assert!(matches!(*source, CompressionError::InvalidInput(_)));
            }
            other => panic!("expected batch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compress_images_with_gallery_profile() {
        let files = vec![
            ImageFile::new("wide.bmp", "image/bmp", create_test_bmp(2000, 400)),
            ImageFile::new("ring.png", "image/png", create_test_png()),
        ];

        let out = compress_images(files, Some(&CompressionProfile::gallery())).await.unwrap();
        assert_eq!(decoded_size(&out[0]), (1600, 320));
        assert_eq!(out[1].dimensions, None);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let out = ImageCompressor::new()
            .compress_many(Vec::new(), &CompressionProfile::default())
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
