//! # 解码与预览流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → 预览 data URL”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 文件签名校验（magic bytes）
//! 2. 读取 header 尺寸并按像素上限快速拒绝
//! 3. 完整解码
//! 4. 超过单边上限时降采样
//! 5. 编码为 PNG 并包装为 data URL

use base64::{Engine as _, engine::general_purpose};
use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, ImageReader, Rgba};
use std::io::Cursor;

use super::source::DisplayImage;
use super::{ScanConfig, ScanError};

/// 预览阶段用到的限制参数（配置快照的子集）。
#[derive(Debug, Clone, Copy)]
pub(crate) struct PreviewLimits {
    pub(crate) max_dimension: u32,
    pub(crate) max_decoded_pixels: u64,
    pub(crate) filter: FilterType,
}

impl From<&ScanConfig> for PreviewLimits {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_dimension: config.preview_max_dimension,
            max_decoded_pixels: config.max_decoded_pixels,
            filter: config.preview_filter,
        }
    }
}

/// 将原始字节解码为可展示的预览。
///
/// 同步且耗 CPU，调用方应放到阻塞线程池执行。
pub(crate) fn decode_for_display(bytes: &[u8], limits: PreviewLimits) -> Result<DisplayImage, ScanError> {
    validate_image_signature(bytes)?;

    let (header_width, header_height) = inspect_dimensions_from_memory(bytes)?;
    validate_pixel_limits(limits, header_width, header_height)?;

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ScanError::load(format!("图片解码失败：{}", e)))?;

    let (source_width, source_height) = decoded.dimensions();
    validate_pixel_limits(limits, source_width, source_height)?;

    let preview = maybe_downscale(decoded, limits);
    let (width, height) = preview.dimensions();

    let mut cursor = Cursor::new(Vec::new());
    preview
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ScanError::load(format!("预览编码失败：{}", e)))?;
    let encoded = general_purpose::STANDARD.encode(cursor.into_inner());

    log::info!(
        "✅ 图片解码成功 - 原始尺寸: {}x{} 预览尺寸: {}x{}",
        source_width,
        source_height,
        width,
        height
    );

    Ok(DisplayImage {
        data_url: format!("data:image/png;base64,{}", encoded),
        width,
        height,
        source_width,
        source_height,
    })
}

/// 通过文件签名（magic bytes）校验输入是否为图片。
///
/// 上报的 MIME 只是声明，真正的内容以签名为准。
fn validate_image_signature(bytes: &[u8]) -> Result<(), ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::load("图片内容为空"));
    }

    let kind = infer::get(bytes).ok_or_else(|| ScanError::load("无法识别图片类型"))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ScanError::load(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ScanError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::load(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| ScanError::load(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(limits: PreviewLimits, width: u32, height: u32) -> Result<(), ScanError> {
    let pixels = (width as u64) * (height as u64);

    if pixels == 0 {
        return Err(ScanError::load("图片尺寸为 0"));
    }

    if pixels > limits.max_decoded_pixels {
        return Err(ScanError::load(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, limits.max_decoded_pixels
        )));
    }

    Ok(())
}

fn maybe_downscale(image: DynamicImage, limits: PreviewLimits) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= limits.max_dimension && height <= limits.max_dimension {
        return image;
    }

    let scale = (limits.max_dimension as f64 / width as f64)
        .min(limits.max_dimension as f64 / height as f64);
    let target_width = ((width as f64 * scale).floor() as u32).max(1);
    let target_height = ((height as f64 * scale).floor() as u32).max(1);

    log::info!(
        "🧩 预览降采样：{}x{} -> {}x{}（filter={:?}）",
        width,
        height,
        target_width,
        target_height,
        limits.filter
    );

    match resize_with_fast_image_resize(&image, target_width, target_height, limits.filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
            image.resize_exact(target_width, target_height, limits.filter)
        }
    }
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, ScanError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x4)
            .map_err(|e| ScanError::load(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ScanError::load(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
        target_width,
        target_height,
        dst_image.into_vec(),
    )
    .ok_or_else(|| ScanError::load("fast_image_resize 输出缓冲长度异常"))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
