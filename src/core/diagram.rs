use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use sha2::{Digest, Sha256};

/// Output format requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    #[default]
    Svg,
    Png,
}

impl ImageType {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Svg => "svg",
            ImageType::Png => "png",
        }
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "svg" => Ok(ImageType::Svg),
            "png" => Ok(ImageType::Png),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Render scale forwarded to the generator, always within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale(u8);

impl Scale {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    pub const DEFAULT: Scale = Scale(10);

    pub fn new(value: i64) -> Option<Self> {
        (i64::from(Self::MIN)..=i64::from(Self::MAX))
            .contains(&value)
            .then(|| Scale(value as u8))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .ok()
            .and_then(Scale::new)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single render job.
///
/// Built with defaults by [`DiagramRequest::new`] and refined with
/// [`DiagramRequest::with_scale`]. The id is derived from the content, so two
/// requests for the same description, type and scale share an output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRequest {
    description: Vec<u8>,
    image_type: ImageType,
    scale: Scale,
    output_dir: PathBuf,
    id: String,
    output_path: PathBuf,
}

impl DiagramRequest {
    pub fn new(description: Vec<u8>, image_type: ImageType, output_dir: &Path) -> Self {
        let mut diagram = Self {
            description,
            image_type,
            scale: Scale::DEFAULT,
            output_dir: output_dir.to_path_buf(),
            id: String::new(),
            output_path: PathBuf::new(),
        };
        diagram.locate();
        diagram
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self.locate();
        self
    }

    fn locate(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.image_type.extension().as_bytes());
        hasher.update([0, self.scale.get(), 0]);
        hasher.update(&self.description);
        self.id = hex::encode(hasher.finalize());
        self.output_path = self
            .output_dir
            .join(format!("{}.{}", self.id, self.image_type.extension()));
    }

    pub fn description(&self) -> &[u8] {
        &self.description
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the generator must leave the rendered artifact.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Rendered bytes together with the type the client asked for.
#[derive(Debug)]
pub struct GenerationResult {
    pub bytes: Vec<u8>,
    pub image_type: ImageType,
}
