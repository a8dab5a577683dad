use serde::{Deserialize, Serialize};

// Struct to represent a color, channels normalized to 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorInput")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }

    pub fn is_translucent(&self) -> bool {
        self.a < 1.0
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorInput {
    Css(String),
    // [r, g, b] or [r, g, b, a] with channels 0..=255 and alpha 0..=1
    Rgba(Vec<f64>),
}

impl TryFrom<ColorInput> for Color {
    type Error = String;

    fn try_from(input: ColorInput) -> Result<Self, Self::Error> {
        match input {
            ColorInput::Css(s) => parse_color(&s).ok_or_else(|| format!("invalid color: {}", s)),
            ColorInput::Rgba(values) => color_from_rgba(&values)
                .ok_or_else(|| format!("invalid color array of length {}", values.len())),
        }
    }
}

fn color_from_rgba(values: &[f64]) -> Option<Color> {
    if !(3..=4).contains(&values.len()) || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let channel = |v: f64| (v / 255.0).clamp(0.0, 1.0) as f32;
    let alpha = values.get(3).copied().unwrap_or(1.0).clamp(0.0, 1.0) as f32;
    Some(Color::new(
        channel(values[0]),
        channel(values[1]),
        channel(values[2]),
        alpha,
    ))
}

// Parse a color string in hex format (#RGB, #RRGGBB, #RRGGBBAA) or rgb()/rgba()
pub fn parse_color(color_str: &str) -> Option<Color> {
    let color_str = color_str.trim();
    if let Some(hex) = color_str.strip_prefix('#') {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f64);
        let values = match hex.len() {
            3 => hex
                .chars()
                .map(|c| channel(&format!("{c}{c}")))
                .collect::<Option<Vec<f64>>>()?,
            6 | 8 => (0..hex.len())
                .step_by(2)
                .map(|i| hex.get(i..i + 2).and_then(channel))
                .collect::<Option<Vec<f64>>>()?,
            _ => return None,
        };
        let mut values = values;
        if values.len() == 4 {
            values[3] /= 255.0;
        }
        return color_from_rgba(&values);
    }

    let inner = color_str
        .strip_prefix("rgba(")
        .or_else(|| color_str.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let values = inner
        .split(',')
        .map(|v| v.trim().parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    color_from_rgba(&values)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillStyle {
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeStyle {
    pub color: Color,
    #[serde(default = "default_stroke_width")]
    pub width: f64,
    #[serde(default)]
    pub line_dash: Option<Vec<f64>>,
}

fn default_stroke_width() -> f64 {
    1.0
}

impl StrokeStyle {
    pub fn is_dashed(&self) -> bool {
        self.line_dash.as_ref().is_some_and(|dash| !dash.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStyle {
    pub src: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub color: Option<Color>,
    /// Decoded image size in pixels, unknown until the image is loaded
    #[serde(default)]
    pub size: Option<[f64; 2]>,
    #[serde(default = "default_true")]
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub text: String,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub fill: Option<FillStyle>,
    #[serde(default)]
    pub stroke: Option<StrokeStyle>,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Vector style of a feature. Every part is optional; a style without any part draws nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub fill: Option<FillStyle>,
    #[serde(default)]
    pub stroke: Option<StrokeStyle>,
    #[serde(default)]
    pub image: Option<ImageStyle>,
    #[serde(default)]
    pub text: Option<TextStyle>,
}

impl Style {
    pub fn with_fill(mut self, color: Color) -> Self {
        self.fill = Some(FillStyle { color });
        self
    }

    pub fn with_stroke(mut self, color: Color, width: f64) -> Self {
        self.stroke = Some(StrokeStyle {
            color,
            width,
            line_dash: None,
        });
        self
    }

    pub fn has_fill(&self) -> bool {
        self.fill.is_some()
    }

    pub fn has_stroke(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn has_text(&self) -> bool {
        self.text.as_ref().is_some_and(|t| !t.text.is_empty())
    }
}
