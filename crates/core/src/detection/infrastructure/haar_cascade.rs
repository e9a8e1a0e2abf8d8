//! Boosted Haar cascade model: loading from OpenCV cascade XML and
//! per-window evaluation.
//!
//! Only the `opencv_storage/cascade` layout with `BOOST` stages and upright
//! `HAAR` features is accepted. The whole model is validated up front so a
//! window evaluation can never index out of bounds or loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::Node;
use thiserror::Error;

use super::integral_image::IntegralImage;

/// Subtracted from every stage threshold on load, as the trainer expects.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model is not well-formed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("model is missing <{0}>")]
    MissingElement(String),
    #[error("invalid value in <{element}>: {value:?}")]
    InvalidValue { element: String, value: String },
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
    #[error("inconsistent cascade: {0}")]
    Inconsistent(String),
}

/// Outcome of running the cascade over one window position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowVerdict {
    Accepted,
    Rejected { stage: usize },
}

#[derive(Clone, Debug, PartialEq)]
struct WeightedRect {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    weight: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
}

impl HaarFeature {
    fn value(&self, integral: &IntegralImage, x: usize, y: usize) -> f64 {
        self.rects
            .iter()
            .map(|r| r.weight * integral.rect_sum(x + r.x, y + r.y, r.width, r.height))
            .sum()
    }
}

/// Internal tree node. Children `> 0` index further nodes; children `<= 0`
/// index leaf `-child`.
#[derive(Clone, Debug, PartialEq)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct WeakClassifier {
    nodes: Vec<TreeNode>,
    leaves: Vec<f64>,
}

impl WeakClassifier {
    fn predict(&self, feature_value: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let next = if feature_value(node.feature) < node.threshold {
                node.left
            } else {
                node.right
            };
            if next <= 0 {
                return self.leaves[next.unsigned_abs() as usize];
            }
            idx = next as usize;
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Stage {
    threshold: f64,
    classifiers: Vec<WeakClassifier>,
}

/// A loaded, validated cascade. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let text = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&text)
    }

    pub fn from_xml(text: &str) -> Result<Self, ModelLoadError> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();
        let cascade = if root.has_tag_name("cascade") {
            root
        } else {
            element(root, "cascade").map_err(|_| {
                ModelLoadError::Unsupported(
                    "expected an opencv_storage/cascade document (legacy haarcascade layout is not supported)"
                        .into(),
                )
            })?
        };

        let stage_type: String = scalar(element(cascade, "stageType")?)?;
        if stage_type != "BOOST" {
            return Err(ModelLoadError::Unsupported(format!("stage type {stage_type}")));
        }
        let feature_type: String = scalar(element(cascade, "featureType")?)?;
        if feature_type != "HAAR" {
            return Err(ModelLoadError::Unsupported(format!(
                "feature type {feature_type}"
            )));
        }
        if let Some(params) = optional_element(cascade, "featureParams") {
            if let Some(max_cat) = optional_element(params, "maxCatCount") {
                if scalar::<u32>(max_cat)? != 0 {
                    return Err(ModelLoadError::Unsupported("categorical splits".into()));
                }
            }
        }

        let width: u32 = scalar(element(cascade, "width")?)?;
        let height: u32 = scalar(element(cascade, "height")?)?;
        if width < 3 || height < 3 {
            return Err(ModelLoadError::Inconsistent(format!(
                "window {width}x{height} is smaller than 3x3"
            )));
        }

        let features = parse_features(element(cascade, "features")?, (width, height))?;
        let stages = parse_stages(element(cascade, "stages")?, features.len())?;
        if stages.is_empty() {
            return Err(ModelLoadError::Inconsistent("cascade has no stages".into()));
        }

        Ok(Self {
            window: (width, height),
            stages,
            features,
        })
    }

    /// Classifier window size in pixels, `(width, height)`.
    pub fn window(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Runs all stages over the window whose top-left is `(x, y)`, stopping
    /// at the first stage that rejects.
    ///
    /// The window must lie inside `integral`.
    pub fn evaluate(&self, integral: &IntegralImage, x: usize, y: usize) -> WindowVerdict {
        let norm = self.inverse_std_dev(integral, x, y);
        for (index, stage) in self.stages.iter().enumerate() {
            let score: f64 = stage
                .classifiers
                .iter()
                .map(|weak| weak.predict(|f| self.features[f].value(integral, x, y) * norm))
                .sum();
            if score < stage.threshold {
                return WindowVerdict::Rejected { stage: index };
            }
        }
        WindowVerdict::Accepted
    }

    /// Lighting normalisation over the window inset by one pixel.
    fn inverse_std_dev(&self, integral: &IntegralImage, x: usize, y: usize) -> f64 {
        let w = self.window.0 as usize - 2;
        let h = self.window.1 as usize - 2;
        let area = (w * h) as f64;
        let sum = integral.rect_sum(x + 1, y + 1, w, h);
        let sq_sum = integral.rect_sq_sum(x + 1, y + 1, w, h);
        let nf = area * sq_sum - sum * sum;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };
        1.0 / nf
    }
}

// ---------------------------------------------------------------------------
// XML parsing
// ---------------------------------------------------------------------------

fn parse_features(node: Node, window: (u32, u32)) -> Result<Vec<HaarFeature>, ModelLoadError> {
    let mut features = Vec::new();
    for (index, feature) in items(node).enumerate() {
        if let Some(tilted) = optional_element(feature, "tilted") {
            if scalar::<i32>(tilted)? != 0 {
                return Err(ModelLoadError::Unsupported(format!(
                    "feature {index} is tilted"
                )));
            }
        }
        let mut rects = Vec::new();
        for rect in items(element(feature, "rects")?) {
            rects.push(parse_rect(rect, index, window)?);
        }
        if rects.is_empty() {
            return Err(ModelLoadError::Inconsistent(format!(
                "feature {index} has no rectangles"
            )));
        }
        features.push(HaarFeature { rects });
    }
    Ok(features)
}

fn parse_rect(
    node: Node,
    feature: usize,
    window: (u32, u32),
) -> Result<WeightedRect, ModelLoadError> {
    let values: Vec<f64> = list(node)?;
    let invalid = || ModelLoadError::InvalidValue {
        element: "rects".into(),
        value: text(node).trim().to_string(),
    };
    let [x, y, w, h, weight] = <[f64; 5]>::try_from(values).map_err(|_| invalid())?;
    let coords = [x, y, w, h];
    if coords.iter().any(|v| *v < 0.0 || v.fract() != 0.0) {
        return Err(invalid());
    }
    let [x, y, width, height] = coords.map(|v| v as usize);
    if x + width > window.0 as usize || y + height > window.1 as usize {
        return Err(ModelLoadError::Inconsistent(format!(
            "feature {feature} rectangle ({x}, {y}, {width}, {height}) leaves the window"
        )));
    }
    Ok(WeightedRect {
        x,
        y,
        width,
        height,
        weight,
    })
}

fn parse_stages(node: Node, feature_count: usize) -> Result<Vec<Stage>, ModelLoadError> {
    let mut stages = Vec::new();
    for (index, stage) in items(node).enumerate() {
        let threshold: f64 = scalar(element(stage, "stageThreshold")?)?;
        let mut classifiers = Vec::new();
        for weak in items(element(stage, "weakClassifiers")?) {
            classifiers.push(parse_weak_classifier(weak, feature_count)?);
        }
        if classifiers.is_empty() {
            return Err(ModelLoadError::Inconsistent(format!(
                "stage {index} has no weak classifiers"
            )));
        }
        stages.push(Stage {
            threshold: threshold - STAGE_THRESHOLD_EPS,
            classifiers,
        });
    }
    Ok(stages)
}

fn parse_weak_classifier(
    node: Node,
    feature_count: usize,
) -> Result<WeakClassifier, ModelLoadError> {
    let internal = element(node, "internalNodes")?;
    let raw: Vec<f64> = list(internal)?;
    let leaves: Vec<f64> = list(element(node, "leafValues")?)?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(ModelLoadError::Inconsistent(format!(
            "internalNodes holds {} values, expected groups of 4",
            raw.len()
        )));
    }

    let as_int = |v: f64| -> Result<i32, ModelLoadError> {
        if v.fract() != 0.0 || v.abs() > i32::MAX as f64 {
            return Err(ModelLoadError::InvalidValue {
                element: "internalNodes".into(),
                value: v.to_string(),
            });
        }
        Ok(v as i32)
    };

    let node_count = raw.len() / 4;
    let mut nodes = Vec::with_capacity(node_count);
    for (i, chunk) in raw.chunks_exact(4).enumerate() {
        let left = as_int(chunk[0])?;
        let right = as_int(chunk[1])?;
        let feature = as_int(chunk[2])?;
        if feature < 0 || feature as usize >= feature_count {
            return Err(ModelLoadError::Inconsistent(format!(
                "node references feature {feature}, model has {feature_count}"
            )));
        }
        for child in [left, right] {
            let valid = if child > 0 {
                // forward-only links keep evaluation loop-free
                (child as usize) > i && (child as usize) < node_count
            } else {
                (child.unsigned_abs() as usize) < leaves.len()
            };
            if !valid {
                return Err(ModelLoadError::Inconsistent(format!(
                    "node {i} has dangling child {child}"
                )));
            }
        }
        nodes.push(TreeNode {
            left,
            right,
            feature: feature as usize,
            threshold: chunk[3],
        });
    }

    Ok(WeakClassifier { nodes, leaves })
}

fn element<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Result<Node<'a, 'i>, ModelLoadError> {
    optional_element(node, name).ok_or_else(|| ModelLoadError::MissingElement(name.to_string()))
}

fn optional_element<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name(name))
}

/// Sequence entries, which OpenCV serialises as `<_>` elements.
fn items<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children()
        .filter(|c| c.is_element() && c.has_tag_name("_"))
}

fn text(node: Node) -> String {
    node.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect()
}

fn scalar<T: FromStr>(node: Node) -> Result<T, ModelLoadError> {
    let raw = text(node);
    raw.trim().parse().map_err(|_| ModelLoadError::InvalidValue {
        element: node.tag_name().name().to_string(),
        value: raw.trim().to_string(),
    })
}

fn list<T: FromStr>(node: Node) -> Result<Vec<T>, ModelLoadError> {
    text(node)
        .split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| ModelLoadError::InvalidValue {
                element: node.tag_name().name().to_string(),
                value: token.to_string(),
            })
        })
        .collect()
}
