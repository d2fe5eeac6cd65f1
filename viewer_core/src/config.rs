//! Host-supplied viewer configuration
//!
//! The host hands over its props once on mount and may change any field later.
//! [`ViewerConfig::apply_patch`] reports which fields actually changed, and
//! [`ConfigEffect::for_fields`] turns those into the small set of directives
//! the viewer acts on.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Image-based lighting preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentPreset {
    None,
    #[default]
    Room,
    Studio,
    Sunset,
}

impl EnvironmentPreset {
    pub fn is_enabled(self) -> bool {
        self != EnvironmentPreset::None
    }
}

/// Full viewer configuration, deserializable from camelCase host props
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    pub model_url: Option<String>,
    pub width: u32,
    pub height: u32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Default pitch in degrees
    pub rotation_x: f32,
    /// Default yaw in degrees
    pub rotation_y: f32,
    #[serde(alias = "defaultZoomDistance")]
    pub default_zoom: f32,
    #[serde(alias = "minZoomDistance")]
    pub min_zoom: f32,
    #[serde(alias = "maxZoomDistance")]
    pub max_zoom: f32,
    pub enable_mouse_parallax: bool,
    pub enable_manual_rotation: bool,
    pub enable_hover_rotation: bool,
    pub enable_manual_zoom: bool,
    pub auto_rotate: bool,
    /// Degrees per second
    pub auto_rotate_speed: f32,
    pub ambient_intensity: f32,
    pub key_intensity: f32,
    pub fill_intensity: f32,
    pub rim_intensity: f32,
    pub environment: EnvironmentPreset,
    pub auto_frame: bool,
    pub placeholder_image: Option<String>,
    pub show_screenshot_button: bool,
    pub fade_in: bool,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub parallax_strength: f32,
    /// Bounding-sphere radius every loaded model is normalized to
    pub target_radius: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_url: None,
            width: 400,
            height: 400,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            default_zoom: 3.0,
            min_zoom: 1.5,
            max_zoom: 6.0,
            enable_mouse_parallax: true,
            enable_manual_rotation: true,
            enable_hover_rotation: true,
            enable_manual_zoom: true,
            auto_rotate: false,
            auto_rotate_speed: 10.0,
            ambient_intensity: 0.6,
            key_intensity: 1.2,
            fill_intensity: 0.5,
            rim_intensity: 0.8,
            environment: EnvironmentPreset::Room,
            auto_frame: false,
            placeholder_image: None,
            show_screenshot_button: true,
            fade_in: true,
            fov: 50.0,
            parallax_strength: 0.08,
            target_radius: 0.5,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Zoom limits ordered so that `min <= max` even for inverted props
    pub fn zoom_limits(&self) -> (f32, f32) {
        if self.min_zoom <= self.max_zoom {
            (self.min_zoom, self.max_zoom)
        } else {
            (self.max_zoom, self.min_zoom)
        }
    }

    /// Default (pitch, yaw) in radians
    pub fn default_rotation(&self) -> (f32, f32) {
        (self.rotation_x.to_radians(), self.rotation_y.to_radians())
    }

    pub fn model_url(&self) -> Option<&str> {
        self.model_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Directive produced by a configuration change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigEffect {
    ReloadModel,
    UpdateCamera,
    UpdateLights,
    RebuildEnvironment,
}

impl ConfigEffect {
    /// Deduplicated effects for a set of changed fields, in application order
    pub fn for_fields(fields: &[ConfigField]) -> Vec<ConfigEffect> {
        let mut effects: Vec<ConfigEffect> = fields.iter().filter_map(|f| f.effect()).collect();
        effects.sort();
        effects.dedup();
        effects
    }
}

macro_rules! config_fields {
    (@effect $effect:ident) => { Some(ConfigEffect::$effect) };
    (@effect) => { None };
    ($($field:ident: $ty:ty => $variant:ident($name:literal) $(=> $effect:ident)?),* $(,)?) => {
        /// Individually addressable configuration field
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ConfigField {
            $($variant),*
        }

        impl ConfigField {
            /// Host-facing prop name
            pub fn name(self) -> &'static str {
                match self {
                    $(ConfigField::$variant => $name),*
                }
            }

            /// Effect applied when this field changes; `None` means it is read at next use
            pub fn effect(self) -> Option<ConfigEffect> {
                match self {
                    $(ConfigField::$variant => config_fields!(@effect $($effect)?)),*
                }
            }
        }

        /// Partial configuration update
        #[derive(Debug, Clone, Default, PartialEq, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        pub struct ConfigPatch {
            $(pub $field: Option<$ty>),*
        }

        impl ViewerConfig {
            /// Fields whose values differ between `self` and `other`
            pub fn changed_fields(&self, other: &ViewerConfig) -> Vec<ConfigField> {
                let mut changed = Vec::new();
                $(
                    if self.$field != other.$field {
                        changed.push(ConfigField::$variant);
                    }
                )*
                changed
            }

            /// Apply a patch and return the fields that actually changed
            pub fn apply_patch(&mut self, patch: ConfigPatch) -> Vec<ConfigField> {
                let mut changed = Vec::new();
                $(
                    if let Some(value) = patch.$field {
                        if self.$field != value {
                            self.$field = value;
                            changed.push(ConfigField::$variant);
                        }
                    }
                )*
                changed
            }
        }
    };
}

config_fields! {
    model_url: Option<String> => ModelUrl("modelUrl") => ReloadModel,
    auto_frame: bool => AutoFrame("autoFrame") => ReloadModel,
    width: u32 => Width("width") => UpdateCamera,
    height: u32 => Height("height") => UpdateCamera,
    offset_x: f32 => OffsetX("offsetX") => UpdateCamera,
    offset_y: f32 => OffsetY("offsetY") => UpdateCamera,
    rotation_x: f32 => RotationX("rotationX") => UpdateCamera,
    rotation_y: f32 => RotationY("rotationY") => UpdateCamera,
    default_zoom: f32 => DefaultZoom("defaultZoom") => UpdateCamera,
    min_zoom: f32 => MinZoom("minZoom") => UpdateCamera,
    max_zoom: f32 => MaxZoom("maxZoom") => UpdateCamera,
    fov: f32 => Fov("fov") => UpdateCamera,
    parallax_strength: f32 => ParallaxStrength("parallaxStrength") => UpdateCamera,
    enable_mouse_parallax: bool => EnableMouseParallax("enableMouseParallax") => UpdateCamera,
    enable_manual_rotation: bool => EnableManualRotation("enableManualRotation") => UpdateCamera,
    enable_hover_rotation: bool => EnableHoverRotation("enableHoverRotation") => UpdateCamera,
    enable_manual_zoom: bool => EnableManualZoom("enableManualZoom") => UpdateCamera,
    auto_rotate: bool => AutoRotate("autoRotate") => UpdateCamera,
    auto_rotate_speed: f32 => AutoRotateSpeed("autoRotateSpeed") => UpdateCamera,
    ambient_intensity: f32 => AmbientIntensity("ambientIntensity") => UpdateLights,
    key_intensity: f32 => KeyIntensity("keyIntensity") => UpdateLights,
    fill_intensity: f32 => FillIntensity("fillIntensity") => UpdateLights,
    rim_intensity: f32 => RimIntensity("rimIntensity") => UpdateLights,
    environment: EnvironmentPreset => Environment("environment") => RebuildEnvironment,
    fade_in: bool => FadeIn("fadeIn"),
    show_screenshot_button: bool => ShowScreenshotButton("showScreenshotButton"),
    placeholder_image: Option<String> => PlaceholderImage("placeholderImage"),
    target_radius: f32 => TargetRadius("targetRadius"),
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
