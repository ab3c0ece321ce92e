//! # 输入校验模块
//!
//! 纯函数：只看元数据（MIME 类型与体积），不读字节、无副作用。
//! 规则按顺序执行，第一条失败的规则决定拒绝原因。

use std::fmt;

/// 允许的最大文件体积：10 MiB。
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// 校验所需的文件元数据。
#[derive(Debug, Clone, Copy)]
pub struct FileMetadata<'a> {
    pub mime_type: &'a str,
    pub size_bytes: u64,
}

/// 拒绝原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAnImage,
    TooLarge,
}

impl Rejection {
    pub fn reason(self) -> &'static str {
        match self {
            Self::NotAnImage => "not an image",
            Self::TooLarge => "too large",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// 校验结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    Rejected(Rejection),
}

impl Validation {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// 使用默认体积上限校验。
///
/// # 示例
/// ```rust
/// use skinscan::scan::{validate, FileMetadata, Rejection, Validation};
///
/// let verdict = validate(FileMetadata { mime_type: "text/plain", size_bytes: 100 });
/// assert_eq!(verdict, Validation::Rejected(Rejection::NotAnImage));
/// ```
pub fn validate(metadata: FileMetadata<'_>) -> Validation {
    validate_with_limit(metadata, MAX_IMAGE_BYTES)
}

/// 使用指定体积上限校验。
pub fn validate_with_limit(metadata: FileMetadata<'_>, max_size_bytes: u64) -> Validation {
    if !metadata.mime_type.starts_with("image/") {
        return Validation::Rejected(Rejection::NotAnImage);
    }

    if metadata.size_bytes > max_size_bytes {
        return Validation::Rejected(Rejection::TooLarge);
    }

    Validation::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta(mime_type: &str, size_bytes: u64) -> FileMetadata<'_> {
        FileMetadata {
            mime_type,
            size_bytes,
        }
    }

    #[test]
    fn accepts_common_image_types_within_limit() {
        for mime in ["image/png", "image/jpeg", "image/webp"] {
            assert_eq!(validate(meta(mime, 500_000)), Validation::Accepted);
        }
    }

    #[test]
    fn limit_is_inclusive() {
        assert_eq!(validate(meta("image/png", MAX_IMAGE_BYTES)), Validation::Accepted);
        assert_eq!(
            validate(meta("image/png", MAX_IMAGE_BYTES + 1)),
            Validation::Rejected(Rejection::TooLarge)
        );
    }

    #[test]
    fn mime_rule_wins_over_size_rule() {
        assert_eq!(
            validate(meta("application/pdf", 20_000_000)),
            Validation::Rejected(Rejection::NotAnImage)
        );
    }

    #[test]
    fn mime_prefix_is_case_sensitive() {
        // 与浏览器 File.type 一致：类型总是小写。
        assert_eq!(
            validate(meta("IMAGE/PNG", 10)),
            Validation::Rejected(Rejection::NotAnImage)
        );
        assert_eq!(validate(meta("", 10)), Validation::Rejected(Rejection::NotAnImage));
    }

    proptest! {
        #[test]
        fn non_image_mime_is_always_rejected(
            mime in "[a-z]{1,12}/[a-z0-9.+-]{1,16}",
            size in any::<u64>(),
        ) {
            prop_assume!(!mime.starts_with("image/"));
            prop_assert_eq!(
                validate(meta(&mime, size)),
                Validation::Rejected(Rejection::NotAnImage)
            );
        }

        #[test]
        fn oversized_files_are_always_rejected(
            subtype in "[a-z0-9.+-]{1,16}",
            size in (MAX_IMAGE_BYTES + 1)..=u64::MAX,
        ) {
            let mime = format!("image/{subtype}");
            prop_assert_eq!(
                validate(meta(&mime, size)),
                Validation::Rejected(Rejection::TooLarge)
            );
        }

        #[test]
        fn oversized_files_never_pass_whatever_the_mime(
            mime in "[a-z]{1,12}/[a-z0-9.+-]{1,16}",
            size in (MAX_IMAGE_BYTES + 1)..=u64::MAX,
        ) {
            prop_assert!(!validate(meta(&mime, size)).is_accepted());
        }

        #[test]
        fn images_within_limit_are_accepted(
            subtype in "[a-z0-9.+-]{1,16}",
            size in 0..=MAX_IMAGE_BYTES,
        ) {
            let mime = format!("image/{subtype}");
            prop_assert!(validate(meta(&mime, size)).is_accepted());
        }
    }
}
