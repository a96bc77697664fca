//! Image I/O operations service
//!
//! Decodes encoded bytes into [`Raster`]s and encodes rasters back into
//! PNG, JPEG or WebP. Blocking codec work has async wrappers that run on
//! the tokio blocking pool.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    services::format::OutputFormatHandler,
    types::Raster,
};
use image::codecs::jpeg::JpegEncoder;
use std::{io::Cursor, path::Path};

/// Service for handling image decoding, encoding and file I/O
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image from bytes, detecting the format from its content
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_maskcomp::services::ImageIOService;
    ///
    /// let image_data = std::fs::read("input.jpg")?;
    /// let raster = ImageIOService::decode(&image_data)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - Empty input, unknown format or corrupt data
    pub fn decode(bytes: &[u8]) -> Result<Raster> {
        if bytes.is_empty() {
            return Err(BgRemovalError::decode("Input contains no image data"));
        }

        let image = image::load_from_memory(bytes).map_err(|e| {
            BgRemovalError::decode(format!("Failed to decode image from bytes: {}", e))
        })?;

        Raster::from_dynamic(&image)
            .map_err(|e| BgRemovalError::decode(format!("Decoded image is unusable: {}", e)))
    }

    /// Encode a raster into the given format
    ///
    /// `quality` is in `[0, 1]` and only used by JPEG, which defaults to 0.9.
    /// PNG and WebP are lossless and keep the alpha channel.
    ///
    /// # Errors
    /// - Quality outside `[0, 1]`
    /// - Encoder failures, e.g. WebP without the `webp-support` feature
    pub fn encode(raster: &Raster, format: OutputFormat, quality: Option<f32>) -> Result<Vec<u8>> {
        let image = OutputFormatHandler::convert_format(raster, format);
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            OutputFormat::Jpeg => {
                let quality = OutputFormatHandler::encoder_quality(
                    quality.unwrap_or(crate::services::format::DEFAULT_JPEG_QUALITY),
                )?;
                let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
                encoder.encode_image(&image.to_rgb8()).map_err(|e| {
                    BgRemovalError::encode(format!("Failed to encode JPEG: {}", e))
                })?;
            },
            OutputFormat::Png | OutputFormat::WebP => {
                image
                    .write_to(&mut cursor, OutputFormatHandler::image_format(format))
                    .map_err(|e| {
                        BgRemovalError::encode(format!("Failed to encode {:?}: {}", format, e))
                    })?;
            },
        }

        log::debug!(
            "Encoded {}x{} raster as {} ({} bytes)",
            raster.width(),
            raster.height(),
            OutputFormatHandler::mime_type(format),
            buffer.len()
        );
        Ok(buffer)
    }

    /// Load and decode an image file
    ///
    /// # Errors
    /// - Missing or unreadable file
    /// - Decoding failures
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Raster> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(BgRemovalError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        let data = std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read image data", path_ref, &e))?;

        Self::decode(&data).map_err(|e| match e {
            BgRemovalError::Decode(msg) => BgRemovalError::decode(format!(
                "{} (path: {}, size: {} bytes)",
                msg,
                path_ref.display(),
                data.len()
            )),
            other => other,
        })
    }

    /// Encode a raster and write it to a file, creating parent directories
    ///
    /// # Errors
    /// - Encoding failures
    /// - Directory creation or file write failures
    pub fn save<P: AsRef<Path>>(
        raster: &Raster,
        path: P,
        format: OutputFormat,
        quality: Option<f32>,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BgRemovalError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        let bytes = Self::encode(raster, format, quality)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| BgRemovalError::file_io_error("write output image", path_ref, &e))
    }

    /// Check if a file path has a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(OutputFormatHandler::from_extension)
            .is_some()
    }

    /// Decode on the blocking thread pool
    ///
    /// # Errors
    /// - Decoding failures
    /// - The blocking task was cancelled or panicked
    pub async fn decode_async(bytes: Vec<u8>) -> Result<Raster> {
        tokio::task::spawn_blocking(move || Self::decode(&bytes))
            .await
            .map_err(|e| BgRemovalError::decode(format!("Decode task failed: {}", e)))?
    }

    /// Encode on the blocking thread pool
    ///
    /// # Errors
    /// - Encoding failures
    /// - The blocking task was cancelled or panicked
    pub async fn encode_async(
        raster: Raster,
        format: OutputFormat,
        quality: Option<f32>,
    ) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || Self::encode(&raster, format, quality))
            .await
            .map_err(|e| BgRemovalError::encode(format!("Encode task failed: {}", e)))?
    }

    /// Read an encoded image from an async reader and decode it
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_maskcomp::services::ImageIOService;
    /// use tokio::fs::File;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let file = File::open("image.jpg").await?;
    /// let raster = ImageIOService::load_from_reader(file).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Read failures
    /// - Decoding failures
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Result<Raster> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;

        Self::decode_async(buffer).await
    }

    /// Encode a raster and write it to an async writer
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// - Encoding failures
    /// - Write or flush failures
    pub async fn save_to_writer<W: tokio::io::AsyncWrite + Unpin>(
        raster: &Raster,
        mut writer: W,
        format: OutputFormat,
        quality: Option<f32>,
    ) -> Result<u64> {
        use tokio::io::AsyncWriteExt;

        let bytes = Self::encode_async(raster.clone(), format, quality).await?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;

        Ok(bytes.len() as u64)
    }
}
