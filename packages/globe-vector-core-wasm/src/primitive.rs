//! Primitive descriptors built from geometry options.
//!
//! One primitive is built per option kind, carrying all geometry instances of that kind.
//! Appearance, classification and picking follow the feature's style and properties.

use serde::Serialize;

use crate::engine_geometry::EngineGeometry;
use crate::factory::{GeometryOption, GeometryOptionKind};
use crate::geometry::Feature;
use crate::placement::PlacementHandle;
use crate::point_pipeline::{BillboardOptions, LabelOptions, ModelOptions};
use crate::style::{Color, StrokeStyle, Style};
use crate::vector_properties::{ClassificationType, VectorProperties};

pub const STRIPE_REPEAT: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    Primitive,
    GroundPrimitive,
    ClassificationPrimitive,
    GroundPolylinePrimitive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Material {
    Color {
        color: Color,
    },
    #[serde(rename_all = "camelCase")]
    Stripe {
        even_color: Color,
        odd_color: Color,
        repeat: f64,
        horizontal: bool,
    },
}

impl Material {
    /// Stripe material for dashed strokes, plain colour otherwise
    pub fn for_stroke(stroke: &StrokeStyle) -> Self {
        if stroke.is_dashed() {
            Material::Stripe {
                even_color: stroke.color,
                odd_color: Color::TRANSPARENT,
                repeat: STRIPE_REPEAT,
                horizontal: false,
            }
        } else {
            Material::Color {
                color: stroke.color,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Appearance {
    PerInstanceColor { flat: bool, translucent: bool },
    PolylineMaterial { material: Material, translucent: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryInstance {
    pub geometry: EngineGeometry,
    pub color: Color,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub geometry_instances: Vec<GeometryInstance>,
    pub appearance: Appearance,
    pub depth_test: bool,
    pub classification_type: Option<ClassificationType>,
    pub allow_picking: bool,
    /// Id of the originating feature
    pub feature_id: Option<String>,
    /// Composed model matrix, absent means identity
    #[serde(rename = "modelMatrix")]
    pub placement: Option<PlacementHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PrimitiveItem {
    Geometry(Primitive),
    Model(ModelOptions),
}

impl PrimitiveItem {
    pub fn placement(&self) -> Option<&PlacementHandle> {
        match self {
            PrimitiveItem::Geometry(primitive) => primitive.placement.as_ref(),
            PrimitiveItem::Model(model) => Some(&model.placement),
        }
    }
}

/// Unit returned by the converter; the renderer owns it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConvertedItem {
    Billboard { item: BillboardOptions },
    Label { item: LabelOptions },
    #[serde(rename_all = "camelCase")]
    Primitive { item: PrimitiveItem, auto_scale: bool },
    Line { item: Primitive },
}

impl ConvertedItem {
    /// Placement the item is drawn with, if it has its own transform.
    pub fn placement(&self) -> Option<&PlacementHandle> {
        match self {
            ConvertedItem::Primitive { item, .. } => item.placement(),
            ConvertedItem::Line { item } => item.placement.as_ref(),
            _ => None,
        }
    }

    pub fn primitive(&self) -> Option<&Primitive> {
        match self {
            ConvertedItem::Primitive {
                item: PrimitiveItem::Geometry(primitive),
                ..
            }
            | ConvertedItem::Line { item: primitive } => Some(primitive),
            _ => None,
        }
    }
}

fn instances(feature: &Feature, options: &[GeometryOption], color: Color) -> Vec<GeometryInstance> {
    options
        .iter()
        .map(|option| GeometryInstance {
            geometry: option.geometry.clone(),
            color,
            id: feature.id.clone(),
        })
        .collect()
}

fn build(
    feature: &Feature,
    properties: &VectorProperties,
    kind: PrimitiveKind,
    geometry_instances: Vec<GeometryInstance>,
    appearance: Appearance,
    classification_type: Option<ClassificationType>,
) -> Primitive {
    Primitive {
        kind,
        geometry_instances,
        appearance,
        depth_test: true,
        classification_type,
        allow_picking: properties.allow_picking(feature),
        feature_id: feature.id.clone(),
        placement: None,
    }
}

// fill and solid share the classification rules
fn create_area_primitive(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Option<Primitive> {
    let color = style.fill.as_ref()?.color;
    let first = options.first()?;
    let classification = properties.classification_type(feature);

    let (kind, classification_type) = if first.height_info.is_clamped() {
        (
            PrimitiveKind::GroundPrimitive,
            Some(classification.unwrap_or(ClassificationType::Terrain)),
        )
    } else if classification.is_some() {
        (PrimitiveKind::ClassificationPrimitive, classification)
    } else {
        (PrimitiveKind::Primitive, None)
    };
    let flat = kind != PrimitiveKind::ClassificationPrimitive;

    Some(build(
        feature,
        properties,
        kind,
        instances(feature, options, color),
        Appearance::PerInstanceColor {
            flat,
            translucent: color.is_translucent(),
        },
        classification_type,
    ))
}

pub fn create_fill_primitive_item(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Option<Primitive> {
    create_area_primitive(feature, style, properties, options)
}

pub fn create_solid_primitive_item(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Option<Primitive> {
    create_area_primitive(feature, style, properties, options)
}

pub fn create_outline_primitive_item(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Option<Primitive> {
    let color = style.stroke.as_ref()?.color;
    if options.is_empty() {
        return None;
    }
    Some(build(
        feature,
        properties,
        PrimitiveKind::Primitive,
        instances(feature, options, color),
        Appearance::PerInstanceColor {
            flat: true,
            translucent: color.is_translucent(),
        },
        None,
    ))
}

pub fn create_line_primitive_item(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Option<Primitive> {
    let stroke = style.stroke.as_ref()?;
    if options.is_empty() {
        return None;
    }
    Some(build(
        feature,
        properties,
        PrimitiveKind::Primitive,
        instances(feature, options, stroke.color),
        Appearance::PolylineMaterial {
            material: Material::for_stroke(stroke),
            translucent: stroke.color.is_translucent(),
        },
        None,
    ))
}

pub fn create_ground_line_primitive_item(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Option<Primitive> {
    let stroke = style.stroke.as_ref()?;
    if options.is_empty() {
        return None;
    }
    let classification_type = properties
        .classification_type(feature)
        .unwrap_or(ClassificationType::Terrain);
    Some(build(
        feature,
        properties,
        PrimitiveKind::GroundPolylinePrimitive,
        instances(feature, options, stroke.color),
        Appearance::PolylineMaterial {
            material: Material::for_stroke(stroke),
            translucent: stroke.color.is_translucent(),
        },
        Some(classification_type),
    ))
}

const KIND_ORDER: [GeometryOptionKind; 5] = [
    GeometryOptionKind::Solid,
    GeometryOptionKind::Outline,
    GeometryOptionKind::Fill,
    GeometryOptionKind::Line,
    GeometryOptionKind::GroundLine,
];

/// Groups `options` by kind and builds one primitive per non-empty group.
pub fn create_primitive_items(
    feature: &Feature,
    style: &Style,
    properties: &VectorProperties,
    options: &[GeometryOption],
) -> Vec<Primitive> {
    KIND_ORDER
        .iter()
        .filter_map(|kind| {
            let group: Vec<GeometryOption> = options
                .iter()
                .filter(|option| option.kind == *kind)
                .cloned()
                .collect();
            if group.is_empty() {
                return None;
            }
            match kind {
                GeometryOptionKind::Solid => {
                    create_solid_primitive_item(feature, style, properties, &group)
                }
                GeometryOptionKind::Outline => {
                    create_outline_primitive_item(feature, style, properties, &group)
                }
                GeometryOptionKind::Fill => {
                    create_fill_primitive_item(feature, style, properties, &group)
                }
                GeometryOptionKind::Line => {
                    create_line_primitive_item(feature, style, properties, &group)
                }
                GeometryOptionKind::GroundLine => {
                    create_ground_line_primitive_item(feature, style, properties, &group)
                }
            }
        })
        .collect()
}
