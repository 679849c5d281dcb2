use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::error::{AutosubError, Result};
use crate::models::Transcription;

const DEFAULT_STYLE: &str = "Default";
const GROUP_FONT_SIZE: u32 = 10;

/// RGB colour of a subtitle style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    /// `&HAABBGGRR` as Advanced SubStation expects, fully opaque
    pub fn to_ass(&self) -> String {
        format!("&H00{:02X}{:02X}{:02X}", self.b, self.g, self.r)
    }
}

/// One subtitle track to merge, as declared in a combine-config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleGroup {
    pub name: String,
    pub color_hex: String,
    pub margin_bottom: u32,
    pub json_path: String,
}

impl SubtitleGroup {
    /// Parse `color_hex`, with or without a leading `#`
    pub fn color_rgb(&self) -> Result<Color> {
        let value = self.color_hex.trim_start_matches('#');
        if value.len() != 6 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AutosubError::Validation(format!(
                "color_hex must be a 6 digit hex string optionally starting with '#', got '{}'",
                self.color_hex
            )));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&value[i..i + 2], 16)
                .map_err(|e| AutosubError::Validation(format!("Invalid colour '{}': {}", self.color_hex, e)))
        };
        Ok(Color { r: channel(0)?, g: channel(2)?, b: channel(4)? })
    }

    /// Load the groups of a combine-config file
    pub async fn load_all<P: AsRef<Path>>(path: P) -> Result<Vec<SubtitleGroup>> {
        let content = fs::read_to_string(path).await?;
        let groups: Vec<SubtitleGroup> = serde_json::from_str(&content)?;
        for group in &groups {
            group.color_rgb()?;
        }
        Ok(groups)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Style {
    name: String,
    font_size: u32,
    primary_color: Color,
    margin_v: u32,
}

impl Style {
    fn default_style() -> Self {
        Self {
            name: DEFAULT_STYLE.to_string(),
            font_size: 20,
            primary_color: Color::WHITE,
            margin_v: 10,
        }
    }

    fn to_ass(&self) -> String {
        format!(
            "Style: {},Arial,{},{},&H000000FF,{},{},0,0,0,0,100,100,0,0,1,2,2,2,10,10,{},1",
            self.name,
            self.font_size,
            self.primary_color.to_ass(),
            Color::BLACK.to_ass(),
            Color::BLACK.to_ass(),
            self.margin_v,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Event {
    start: Duration,
    end: Duration,
    style: String,
    text: String,
}

/// Advanced SubStation file holding several styled tracks.
///
/// Each group gets a copy of the default style with its own colour, a
/// smaller font and the bottom margin raised by `margin_bottom`, so tracks
/// stack instead of overlapping.
#[derive(Debug, Clone)]
pub struct SubtitleFile {
    styles: Vec<Style>,
    events: Vec<Event>,
    prefix_group_name: bool,
}

impl SubtitleFile {
    pub fn new(groups: &[SubtitleGroup], prefix_group_name: bool) -> Result<Self> {
        let default = Style::default_style();
        let mut styles = vec![default.clone()];

        for group in groups {
            let style = Style {
                name: group.name.clone(),
                font_size: GROUP_FONT_SIZE,
                primary_color: group.color_rgb()?,
                margin_v: default.margin_v + group.margin_bottom,
            };
            match styles.iter_mut().find(|s| s.name == group.name) {
                Some(existing) => *existing = style,
                None => styles.push(style),
            }
        }

        Ok(Self { styles, events: Vec::new(), prefix_group_name })
    }

    pub fn add(&mut self, group_name: &str, transcription: &Transcription) {
        let text = if self.prefix_group_name {
            format!("{}: {}", group_name, transcription.text)
        } else {
            transcription.text.clone()
        };

        self.events.push(Event {
            start: transcription.time_start,
            end: transcription.time_end,
            style: group_name.to_string(),
            text,
        });
    }

    pub fn add_all<'a, I>(&mut self, group_name: &str, transcriptions: I)
    where
        I: IntoIterator<Item = &'a Transcription>,
    {
        for transcription in transcriptions {
            self.add(group_name, transcription);
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn to_ass_string(&self) -> String {
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str("; Script generated by autosub\n");
        out.push_str("ScriptType: v4.00+\n");
        out.push_str("WrapStyle: 0\n");
        out.push_str("ScaledBorderAndShadow: yes\n");
        out.push_str("Collisions: Normal\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
             Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, \
             Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
        );
        for style in &self.styles {
            out.push_str(&style.to_ass());
            out.push('\n');
        }
        out.push('\n');

        out.push_str("[Events]\n");
        out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
        for event in &self.events {
            let _ = writeln!(
                out,
                "Dialogue: 0,{},{},{},,0,0,0,,{}",
                format_ass_time(event.start),
                format_ass_time(event.end),
                event.style,
                event.text.replace("\r\n", "\\N").replace('\n', "\\N"),
            );
        }
        out
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Writing {} subtitle events to {}", self.events.len(), path.display());
        fs::write(path, self.to_ass_string()).await?;
        Ok(())
    }
}

/// `H:MM:SS.cc`, rounded to centiseconds
fn format_ass_time(offset: Duration) -> String {
    let centis = (offset.as_millis() + 5) / 10;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6_000;
    let secs = (centis % 6_000) / 100;
    let cs = centis % 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, cs)
}

/// Generate SRT subtitle file from transcriptions
pub async fn generate_srt<P: AsRef<Path>>(transcriptions: &[Transcription], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    fs::write(output_path, srt_content(transcriptions)).await?;

    info!("SRT file generated successfully");
    Ok(())
}

fn srt_content(transcriptions: &[Transcription]) -> String {
    let mut srt_content = String::new();
    for (index, transcription) in transcriptions.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(transcription.time_start),
            format_srt_time(transcription.time_end),
            transcription.text.trim()
        ));
    }
    srt_content
}

/// Format an offset to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(offset: Duration) -> String {
    let total_milliseconds = offset.as_millis();
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
