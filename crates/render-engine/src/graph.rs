//! Filter-graph AST.
//!
//! Every filter the engine hands to ffmpeg is built from these nodes and
//! turned into text here and nowhere else. Two escaping levels apply to
//! free-form values such as file paths: the filter option parser (`:` and
//! quotes) and the graph parser (brackets, `,` and `;`). Expressions are
//! single-quoted instead, which protects their commas at graph level.

use std::fmt;
use std::path::PathBuf;

use reelcut_processing_core::geometry::GeometryTransform;
use reelcut_processing_core::timeline::TimelinePlan;
use reelcut_project_model::request::TransitionKind;

/// `xfade` transition names used by the concatenator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XfadeTransition {
    /// Out to black, in from black.
    FadeBlack,
    /// Linear blend of the overlapping frames.
    Fade,
}

impl XfadeTransition {
    pub fn for_kind(kind: TransitionKind) -> Option<Self> {
        match kind {
            TransitionKind::None => None,
            TransitionKind::Fade => Some(Self::FadeBlack),
            TransitionKind::Crossfade => Some(Self::Fade),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::FadeBlack => "fadeblack",
            Self::Fade => "fade",
        }
    }
}

/// One `drawtext` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    /// File holding the line text (avoids escaping user text).
    pub text_file: PathBuf,
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
    pub font_color: String,
    pub border_color: String,
    pub border_width: u32,
    /// Horizontal centre of the line.
    pub center_x: f64,
    /// Left and right edges the rendered line must stay between.
    pub min_x: f64,
    pub max_x: f64,
    /// Top edge of the line.
    pub y: f64,
    /// Visible interval `[start, end]` in clip-local seconds.
    pub start_secs: f64,
    pub end_secs: f64,
}

/// A single filter node.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Scale { width: u32, height: u32 },
    Crop { width: u32, height: u32, x: u32, y: u32 },
    Fps { fps: u32 },
    SetSar,
    Format { pix_fmt: &'static str },
    SetTb,
    SetPts,
    DrawText(DrawText),
    Concat { segments: usize },
    Xfade { transition: XfadeTransition, duration_secs: f64, offset_secs: f64 },
    Aresample { sample_rate: u32 },
    Aformat { sample_rate: u32 },
    Apad { whole_duration_secs: f64 },
    Atrim { duration_secs: f64 },
    Asetpts,
    Volume { expr: String },
    Amix { inputs: usize },
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Scale { width, height } => write!(f, "scale={width}:{height}:flags=lanczos"),
            Filter::Crop {
                width,
                height,
                x,
                y,
            } => write!(f, "crop={width}:{height}:{x}:{y}"),
            Filter::Fps { fps } => write!(f, "fps={fps}:round=near"),
            Filter::SetSar => f.write_str("setsar=1"),
            Filter::Format { pix_fmt } => write!(f, "format={pix_fmt}"),
            Filter::SetTb => f.write_str("settb=AVTB"),
            Filter::SetPts => f.write_str("setpts=PTS-STARTPTS"),
            Filter::DrawText(text) => {
                write!(
                    f,
                    "drawtext=textfile={}:expansion=none",
                    escape_path(&text.text_file)
                )?;
                if let Some(font) = &text.font_file {
                    write!(f, ":fontfile={}", escape_path(font))?;
                }
                write!(
                    f,
                    ":fontsize={}:fontcolor={}:borderw={}:bordercolor={}:x='max({:.1},min({:.1}-text_w,{:.1}-text_w/2))':y={:.1}:enable='between(t,{:.3},{:.3})'",
                    text.font_size,
                    escape_value(&text.font_color),
                    text.border_width,
                    escape_value(&text.border_color),
                    text.min_x,
                    text.max_x,
                    text.center_x,
                    text.y,
                    text.start_secs,
                    text.end_secs,
                )
            }
            Filter::Concat { segments } => write!(f, "concat=n={segments}:v=1:a=0"),
            Filter::Xfade {
                transition,
                duration_secs,
                offset_secs,
            } => write!(
                f,
                "xfade=transition={}:duration={duration_secs:.6}:offset={offset_secs:.6}",
                transition.as_str()
            ),
            Filter::Aresample { sample_rate } => write!(f, "aresample={sample_rate}"),
            Filter::Aformat { sample_rate } => write!(
                f,
                "aformat=sample_fmts=fltp:sample_rates={sample_rate}:channel_layouts=stereo"
            ),
            Filter::Apad {
                whole_duration_secs,
            } => write!(f, "apad=whole_dur={whole_duration_secs:.6}"),
            Filter::Atrim { duration_secs } => write!(f, "atrim=duration={duration_secs:.6}"),
            Filter::Asetpts => f.write_str("asetpts=PTS-STARTPTS"),
            Filter::Volume { expr } => write!(f, "volume='{expr}':eval=frame"),
            Filter::Amix { inputs } => {
                write!(f, "amix=inputs={inputs}:duration=first:normalize=0")
            }
        }
    }
}

/// Linear chain of filters between labelled pads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn input(mut self, label: impl Into<String>) -> Self {
        self.inputs.push(label.into());
        self
    }

    pub fn output(mut self, label: impl Into<String>) -> Self {
        self.outputs.push(label.into());
        self
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "[{label}]")?;
        }
        for (idx, filter) in self.filters.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        for label in &self.outputs {
            write!(f, "[{label}]")?;
        }
        Ok(())
    }
}

/// `;`-separated chains, as passed to `-filter_complex`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, chain) in self.chains.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

/// Escape a value for the option parser, then for the graph parser.
pub fn escape_value(raw: &str) -> String {
    let mut option_level = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }
    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

fn escape_path(path: &std::path::Path) -> String {
    escape_value(&path.to_string_lossy())
}

/// Scale, crop, resample and square the pixels of one source.
pub fn geometry_chain(transform: &GeometryTransform) -> FilterChain {
    FilterChain::new(vec![
        Filter::Scale {
            width: transform.scaled.width,
            height: transform.scaled.height,
        },
        Filter::Crop {
            width: transform.target.width,
            height: transform.target.height,
            x: transform.crop_x,
            y: transform.crop_y,
        },
        Filter::Fps { fps: transform.fps },
        Filter::SetSar,
        Filter::Format { pix_fmt: "yuv420p" },
    ])
}

/// One `drawtext` node per line.
pub fn overlay_chain(texts: &[DrawText]) -> FilterChain {
    FilterChain::new(texts.iter().cloned().map(Filter::DrawText).collect())
}

/// Join `plan.len()` video inputs into `[vout]`.
pub fn concat_graph(plan: &TimelinePlan) -> FilterGraph {
    let mut graph = FilterGraph::default();
    for idx in 0..plan.len() {
        graph.push(
            FilterChain::new(vec![Filter::SetTb, Filter::SetPts])
                .input(format!("{idx}:v"))
                .output(format!("v{idx}")),
        );
    }

    let xfade = XfadeTransition::for_kind(plan.kind()).filter(|_| plan.total_overlap_secs() > 0.0);
    match xfade {
        None => {
            let mut chain = FilterChain::new(vec![Filter::Concat {
                segments: plan.len(),
            }]);
            for idx in 0..plan.len() {
                chain = chain.input(format!("v{idx}"));
            }
            graph.push(chain.output("vout"));
        }
        Some(transition) => {
            let offsets = plan.xfade_offsets();
            let last = plan.transitions().len().saturating_sub(1);
            let mut previous = "v0".to_string();
            for (idx, (duration, offset)) in plan.transitions().iter().zip(offsets).enumerate() {
                let output = if idx == last {
                    "vout".to_string()
                } else {
                    format!("x{}", idx + 1)
                };
                graph.push(
                    FilterChain::new(vec![Filter::Xfade {
                        transition,
                        duration_secs: *duration,
                        offset_secs: offset,
                    }])
                    .input(previous)
                    .input(format!("v{}", idx + 1))
                    .output(output.clone()),
                );
                previous = output;
            }
        }
    }
    graph
}

/// Voice (input 0) and optional music (input 1) mixed into `[aout]`.
pub fn mix_graph(
    duration_secs: f64,
    sample_rate: u32,
    music_volume_expr: Option<&str>,
) -> FilterGraph {
    let normalize = |filters: &mut Vec<Filter>| {
        filters.push(Filter::Aresample { sample_rate });
        filters.push(Filter::Aformat { sample_rate });
    };

    let mut voice = Vec::new();
    normalize(&mut voice);
    voice.push(Filter::Apad {
        whole_duration_secs: duration_secs,
    });
    voice.push(Filter::Atrim { duration_secs });
    voice.push(Filter::Asetpts);

    let mut graph = FilterGraph::default();
    match music_volume_expr {
        None => graph.push(FilterChain::new(voice).input("0:a").output("aout")),
        Some(expr) => {
            graph.push(FilterChain::new(voice).input("0:a").output("voice"));
            let mut music = Vec::new();
            normalize(&mut music);
            music.push(Filter::Atrim { duration_secs });
            music.push(Filter::Asetpts);
            music.push(Filter::Volume {
                expr: expr.to_string(),
            });
            graph.push(FilterChain::new(music).input("1:a").output("music"));
            graph.push(
                FilterChain::new(vec![Filter::Amix { inputs: 2 }])
                    .input("voice")
                    .input("music")
                    .output("aout"),
            );
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_project_model::media::FrameSize;
    use reelcut_project_model::request::TransitionSpec;

    #[test]
    fn test_geometry_chain_text() {
        let t = GeometryTransform::compute(FrameSize::new(1920, 1080), FrameSize::VERTICAL_HD, 30)
            .unwrap();
        assert_eq!(
            geometry_chain(&t).to_string(),
            "scale=3414:1920:flags=lanczos,crop=1080:1920:1167:0,fps=30:round=near,setsar=1,format=yuv420p"
        );
    }

    #[test]
    fn test_escape_value_levels() {
        assert_eq!(escape_value("plain"), "plain");
        assert_eq!(escape_value("/tmp/a:b/c,d.txt"), r"/tmp/a\\:b/c\,d.txt");
        assert_eq!(escape_value("it's"), r"it\\\'s");
    }

    #[test]
    fn test_drawtext_node() {
        let node = Filter::DrawText(DrawText {
            text_file: PathBuf::from("/ws/cue-0-0.txt"),
            font_file: None,
            font_size: 61,
            font_color: "white".into(),
            border_color: "black".into(),
            border_width: 4,
            center_x: 540.0,
            min_x: 86.4,
            max_x: 993.6,
            y: 1456.7,
            start_secs: 0.5,
            end_secs: 2.0,
        });
        assert_eq!(
            node.to_string(),
            "drawtext=textfile=/ws/cue-0-0.txt:expansion=none:fontsize=61:fontcolor=white:borderw=4:bordercolor=black:x='max(86.4,min(993.6-text_w,540.0-text_w/2))':y=1456.7:enable='between(t,0.500,2.000)'"
        );
    }

    #[test]
    fn test_concat_graph_none() {
        let plan = TimelinePlan::build(&[5.0, 5.0, 5.0], &TransitionSpec::none(), 30);
        assert_eq!(
            concat_graph(&plan).to_string(),
            "[0:v]settb=AVTB,setpts=PTS-STARTPTS[v0];[1:v]settb=AVTB,setpts=PTS-STARTPTS[v1];[2:v]settb=AVTB,setpts=PTS-STARTPTS[v2];[v0][v1][v2]concat=n=3:v=1:a=0[vout]"
        );
    }

    #[test]
    fn test_concat_graph_chains_xfades() {
        let plan = TimelinePlan::build(&[4.0, 3.0, 6.0], &TransitionSpec::crossfade(1.0), 30);
        let text = concat_graph(&plan).to_string();
        assert!(text.contains(
            "[v0][v1]xfade=transition=fade:duration=1.000000:offset=3.000000[x1]"
        ));
        assert!(text.ends_with(
            "[x1][v2]xfade=transition=fade:duration=1.000000:offset=5.000000[vout]"
        ));
    }

    #[test]
    fn test_fade_uses_black() {
        let plan = TimelinePlan::build(&[5.0, 5.0], &TransitionSpec::fade(1.0), 30);
        assert!(concat_graph(&plan)
            .to_string()
            .contains("xfade=transition=fadeblack:duration=1.000000:offset=4.000000[vout]"));
    }

    #[test]
    fn test_zero_length_fade_falls_back_to_concat() {
        let plan = TimelinePlan::build(&[5.0, 5.0], &TransitionSpec::fade(0.0), 30);
        assert!(concat_graph(&plan).to_string().contains("concat=n=2"));
    }

    #[test]
    fn test_mix_graph_shapes() {
        let voice_only = mix_graph(8.0, 48_000, None).to_string();
        assert!(voice_only.starts_with("[0:a]aresample=48000"));
        assert!(voice_only.contains("apad=whole_dur=8.000000,atrim=duration=8.000000"));
        assert!(voice_only.ends_with("[aout]"));
        assert!(!voice_only.contains("amix"));

        let with_music = mix_graph(8.0, 48_000, Some("if(lt(t,0.7),0.5,0.15)")).to_string();
        assert!(with_music.contains("[1:a]"));
        assert!(with_music.contains("volume='if(lt(t,0.7),0.5,0.15)':eval=frame[music]"));
        assert!(with_music.ends_with("[voice][music]amix=inputs=2:duration=first:normalize=0[aout]"));
    }
}
