//! Workflow construction strategies.
//!
//! Turns an [`AnimationSpec`] into a submittable [`WorkflowGraph`].
//! Two strategies exist behind the [`GraphBuilder`] trait: synthesizing
//! the fixed nine-node text-to-animation graph in code, or patching a
//! user-supplied template file. The strategy is chosen once at startup
//! via [`WorkflowBuilder::select`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::catalog::AnimationSpec;
use crate::workflow::{link, NodeInput, WorkflowGraph, WorkflowNode};

// ---------------------------------------------------------------------------
// Graph constants
// ---------------------------------------------------------------------------

/// Base checkpoint loaded by the synthesized graph.
pub const CHECKPOINT_NAME: &str = "v1-5-pruned-emaonly.safetensors";

/// Motion module loaded by the synthesized graph.
pub const MOTION_MODEL_NAME: &str = "mm_sd_v15_v2.ckpt";

/// Beta schedule for the motion module loader.
pub const BETA_SCHEDULE: &str = "autoselect";

/// Suffix appended to every positive prompt to bias toward loopable output.
pub const LOOP_SUFFIX: &str = "seamless loop, first frame equals last frame";

/// Negative conditioning used when a spec leaves its negative prompt empty.
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "static image, still frame, low quality, blurry, pixelated, distorted";

/// Fixed seed so reruns of a spec are reproducible.
pub const SAMPLER_SEED: i64 = 12345;
pub const SAMPLER_STEPS: i64 = 20;
pub const SAMPLER_CFG: f64 = 7.0;
pub const SAMPLER_NAME: &str = "euler";
pub const SAMPLER_SCHEDULER: &str = "normal";
pub const SAMPLER_DENOISE: f64 = 1.0;

pub const CLASS_TEXT_ENCODE: &str = "CLIPTextEncode";
pub const CLASS_CHECKPOINT_LOADER: &str = "CheckpointLoaderSimple";
pub const CLASS_MOTION_LOADER: &str = "ADE_LoadAnimateDiffModel";
pub const CLASS_MOTION_APPLY: &str = "ADE_ApplyAnimateDiffModel";
pub const CLASS_SAMPLER: &str = "KSampler";
pub const CLASS_EMPTY_LATENT: &str = "EmptyLatentImage";
pub const CLASS_VAE_DECODE: &str = "VAEDecode";
pub const CLASS_SAVE_IMAGE: &str = "SaveImage";

// ---------------------------------------------------------------------------
// Strategy trait
// ---------------------------------------------------------------------------

/// Builds a complete workflow graph for one animation spec.
///
/// Building is pure: the same spec always yields the same graph, and
/// nothing is submitted or touched on disk.
pub trait GraphBuilder {
    fn build(&self, spec: &AnimationSpec) -> WorkflowGraph;
}

/// Positive conditioning text: the spec prompt plus the loop-closure suffix.
fn positive_conditioning(spec: &AnimationSpec) -> String {
    format!("{}, {}", spec.prompt, LOOP_SUFFIX)
}

/// Negative conditioning text, falling back to the stock negative when empty.
fn negative_conditioning(spec: &AnimationSpec) -> &str {
    if spec.negative_prompt.is_empty() {
        DEFAULT_NEGATIVE_PROMPT
    } else {
        &spec.negative_prompt
    }
}

// ---------------------------------------------------------------------------
// Synthesized strategy
// ---------------------------------------------------------------------------

/// Synthesizes the fixed nine-node AnimateDiff text-to-animation graph.
///
/// Node ids `"1"` through `"9"`: positive and negative text encoders,
/// checkpoint loader, motion module loader and apply, sampler, empty
/// latent, VAE decode, and the image save output node.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesizedBuilder;

impl GraphBuilder for SynthesizedBuilder {
    fn build(&self, spec: &AnimationSpec) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new();
        graph.insert(
            "1",
            WorkflowNode::new(CLASS_TEXT_ENCODE)
                .input("text", positive_conditioning(spec))
                .input("clip", link("3", 1)),
        );
        graph.insert(
            "2",
            WorkflowNode::new(CLASS_TEXT_ENCODE)
                .input("text", negative_conditioning(spec))
                .input("clip", link("3", 1)),
        );
        graph.insert(
            "3",
            WorkflowNode::new(CLASS_CHECKPOINT_LOADER).input("ckpt_name", CHECKPOINT_NAME),
        );
        graph.insert(
            "4",
            WorkflowNode::new(CLASS_MOTION_LOADER)
                .input("model_name", MOTION_MODEL_NAME)
                .input("beta_schedule", BETA_SCHEDULE),
        );
        graph.insert(
            "5",
            WorkflowNode::new(CLASS_MOTION_APPLY)
                .input("model", link("3", 0))
                .input("motion_model", link("4", 0)),
        );
        graph.insert(
            "6",
            WorkflowNode::new(CLASS_SAMPLER)
                .input("seed", SAMPLER_SEED)
                .input("steps", SAMPLER_STEPS)
                .input("cfg", SAMPLER_CFG)
                .input("sampler_name", SAMPLER_NAME)
                .input("scheduler", SAMPLER_SCHEDULER)
                .input("denoise", SAMPLER_DENOISE)
                .input("model", link("5", 0))
                .input("positive", link("1", 0))
                .input("negative", link("2", 0))
                .input("latent_image", link("7", 0)),
        );
        graph.insert(
            "7",
            WorkflowNode::new(CLASS_EMPTY_LATENT)
                .input("width", spec.width)
                .input("height", spec.height)
                .input("batch_size", spec.frame_count),
        );
        graph.insert(
            "8",
            WorkflowNode::new(CLASS_VAE_DECODE)
                .input("samples", link("6", 0))
                .input("vae", link("3", 2)),
        );
        graph.insert(
            "9",
            WorkflowNode::new(CLASS_SAVE_IMAGE)
                .input("filename_prefix", spec.name.as_str())
                .input("images", link("8", 0)),
        );
        graph
    }
}

// ---------------------------------------------------------------------------
// Template strategy
// ---------------------------------------------------------------------------

/// Template validation and loading failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read workflow template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("workflow template is not valid graph JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("template has {count} {class} nodes, expected exactly one")]
    NodeCount { class: &'static str, count: usize },
    #[error("KSampler input {input:?} must link to a CLIPTextEncode node")]
    BadConditioningLink { input: &'static str },
}

/// Patches a user-supplied workflow template per spec.
///
/// The template keeps its own sampler settings, model choices, and any
/// extra nodes; only the conditioning texts, latent dimensions, and
/// output prefix are rewritten. The wiring contract is checked once at
/// load time so per-spec builds cannot fail.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    template: WorkflowGraph,
    positive_id: String,
    negative_id: String,
    latent_id: String,
    save_id: String,
}

impl TemplateBuilder {
    /// Load and validate a template from a JSON file in API format.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let template: WorkflowGraph = serde_json::from_str(&raw)?;
        Self::from_graph(template)
    }

    /// Validate an already-parsed graph as a template.
    ///
    /// Requirements: exactly one `KSampler` whose `positive` and
    /// `negative` inputs link to `CLIPTextEncode` nodes, exactly one
    /// `EmptyLatentImage`, and exactly one `SaveImage`.
    pub fn from_graph(template: WorkflowGraph) -> Result<Self, TemplateError> {
        let sampler_id = require_single(&template, CLASS_SAMPLER)?;
        let latent_id = require_single(&template, CLASS_EMPTY_LATENT)?;
        let save_id = require_single(&template, CLASS_SAVE_IMAGE)?;
        let positive_id = resolve_conditioning(&template, &sampler_id, "positive")?;
        let negative_id = resolve_conditioning(&template, &sampler_id, "negative")?;
        Ok(Self {
            template,
            positive_id,
            negative_id,
            latent_id,
            save_id,
        })
    }
}

impl GraphBuilder for TemplateBuilder {
    fn build(&self, spec: &AnimationSpec) -> WorkflowGraph {
        let mut graph = self.template.clone();
        // Ids were resolved against this same graph at load time.
        if let Some(node) = graph.node_mut(&self.positive_id) {
            node.set_input("text", positive_conditioning(spec));
        }
        if let Some(node) = graph.node_mut(&self.negative_id) {
            node.set_input("text", negative_conditioning(spec));
        }
        if let Some(node) = graph.node_mut(&self.latent_id) {
            node.set_input("width", spec.width);
            node.set_input("height", spec.height);
            node.set_input("batch_size", spec.frame_count);
        }
        if let Some(node) = graph.node_mut(&self.save_id) {
            node.set_input("filename_prefix", spec.name.as_str());
        }
        graph
    }
}

fn require_single(graph: &WorkflowGraph, class: &'static str) -> Result<String, TemplateError> {
    let ids = graph.find_by_class(class);
    match ids.as_slice() {
        [id] => Ok((*id).to_string()),
        _ => Err(TemplateError::NodeCount {
            class,
            count: ids.len(),
        }),
    }
}

fn resolve_conditioning(
    graph: &WorkflowGraph,
    sampler_id: &str,
    input: &'static str,
) -> Result<String, TemplateError> {
    let target = graph
        .node(sampler_id)
        .and_then(|node| node.get(input))
        .and_then(NodeInput::as_link)
        .map(|l| l.node_id().to_string())
        .ok_or(TemplateError::BadConditioningLink { input })?;
    match graph.node(&target) {
        Some(node) if node.class_type == CLASS_TEXT_ENCODE => Ok(target),
        _ => Err(TemplateError::BadConditioningLink { input }),
    }
}

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

/// The graph-building strategy chosen for a run.
#[derive(Debug, Clone)]
pub enum WorkflowBuilder {
    Synthesized(SynthesizedBuilder),
    Template(TemplateBuilder),
}

impl WorkflowBuilder {
    /// Choose the strategy once at startup.
    ///
    /// A configured template path selects the template strategy and
    /// validates the file immediately; otherwise graphs are synthesized.
    pub fn select(template_path: Option<&Path>) -> Result<Self, TemplateError> {
        match template_path {
            Some(path) => Ok(WorkflowBuilder::Template(TemplateBuilder::load(path)?)),
            None => Ok(WorkflowBuilder::Synthesized(SynthesizedBuilder)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowBuilder::Synthesized(_) => "synthesized",
            WorkflowBuilder::Template(_) => "template",
        }
    }
}

impl GraphBuilder for WorkflowBuilder {
    fn build(&self, spec: &AnimationSpec) -> WorkflowGraph {
        match self {
            WorkflowBuilder::Synthesized(builder) => builder.build(spec),
            WorkflowBuilder::Template(builder) => builder.build(spec),
        }
    }
}
