//! # プロフィール画像ストレージ
//!
//! サインアップ時にアップロードされた画像を保存し、公開 URL を返す。
//!
//! - 本番 / 開発: [`S3ImageStorage`]（Amazon S3 または MinIO）
//! - 画像保存を無効化: [`NoopImageStorage`]（アップロードを拒否）
//!
//! サイズと Content-Type の検証は [`ImageUpload::new`] で行うので、
//! どの実装でも同じ制約になる。

use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use bytes::Bytes;
use warble_domain::user::ImageUrl;

use crate::InfraError;

/// アップロード可能な最大サイズ（5 MiB）
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// 受け付けるラスター画像の Content-Type と拡張子
const RASTER_TYPES: [(&str, &str); 5] = [
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// 検証済みのアップロード画像
#[derive(Debug, Clone)]
pub struct ImageUpload {
    content_type: String,
    extension:    &'static str,
    data:         Bytes,
}

impl ImageUpload {
    /// # Errors
    ///
    /// - Content-Type が JPEG / PNG / GIF / WebP 以外（SVG を含む）: `InvalidInput`
    /// - 空、または [`MAX_IMAGE_BYTES`] を超える: `InvalidInput`
    pub fn new(content_type: impl Into<String>, data: Bytes) -> Result<Self, InfraError> {
        let content_type = content_type.into();

        let Some(extension) = RASTER_TYPES
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(&content_type))
            .map(|(_, ext)| *ext)
        else {
            return Err(InfraError::invalid_input(format!(
                "Unsupported image type: {content_type}"
            )));
        };
        if data.is_empty() {
            return Err(InfraError::invalid_input("Image is empty"));
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(InfraError::invalid_input("Image exceeds 5 MiB"));
        }

        Ok(Self {
            content_type,
            extension,
            data,
        })
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Content-Type から決まる拡張子
    pub fn extension(&self) -> &str {
        self.extension
    }

    /// 保存先のオブジェクトキー（`users/images/<UUID v7>.<拡張子>`）
    pub fn object_key(&self) -> String {
        format!("users/images/{}.{}", uuid::Uuid::now_v7(), self.extension())
    }
}

/// 画像ストレージトレイト
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// 画像を保存し、公開 URL を返す
    async fn put_image(&self, image: &ImageUpload) -> Result<ImageUrl, InfraError>;
}

/// S3 実装
pub struct S3ImageStorage {
    client:          Client,
    bucket_name:     String,
    public_base_url: String,
}

impl S3ImageStorage {
    /// `public_base_url` はオブジェクトキーの前に付けて公開 URL にする
    /// （例: `https://cdn.example.com`）。
    pub fn new(client: Client, bucket_name: String, public_base_url: &str) -> Self {
        Self {
            client,
            bucket_name,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn public_url(&self, key: &str) -> ImageUrl {
        ImageUrl::new(format!("{}/{key}", self.public_base_url))
    }
}

#[async_trait]
impl ImageStorage for S3ImageStorage {
    #[tracing::instrument(skip_all, fields(bytes = image.len()))]
    async fn put_image(&self, image: &ImageUpload) -> Result<ImageUrl, InfraError> {
        let key = image.object_key();

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(image.content_type())
            .body(ByteStream::from(image.data().clone()))
            .send()
            .await
            .map_err(|e| InfraError::s3(format!("画像のアップロードに失敗: {e}")))?;

        tracing::debug!(key = %key, "画像を保存");
        Ok(self.public_url(&key))
    }
}

/// 画像保存が無効な環境での実装
///
/// アップロードを `InvalidInput` で拒否する。画像なしのサインアップは通常どおり成功する。
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopImageStorage;

#[async_trait]
impl ImageStorage for NoopImageStorage {
    async fn put_image(&self, _image: &ImageUpload) -> Result<ImageUrl, InfraError> {
        Err(InfraError::invalid_input("Image uploads are disabled"))
    }
}

/// S3 クライアントを作成する
///
/// `endpoint` を指定した場合（MinIO など）はパススタイルの URL を使う。
/// 認証情報は SDK のデフォルトチェーンで解決する。
pub async fn create_s3_client(region: &str, endpoint: Option<&str>) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));
    if let Some(endpoint_url) = endpoint {
        loader = loader.endpoint_url(endpoint_url);
    }
    let config = loader.load().await;

    let builder = aws_sdk_s3::config::Builder::from(&config);
    let s3_config = if endpoint.is_some() {
        builder.force_path_style(true).build()
    } else {
        builder.build()
    };

    Client::from_conf(s3_config)
}
