//! Point features: billboards, labels, models and custom primitives.

use nalgebra::Vector3;
use serde::Serialize;

use crate::cartesian::{self, Cartesian3};
use crate::engine_geometry::EngineGeometry;
use crate::error::ConvertError;
use crate::factory::{PointFactory, PointOptions, VectorGeometryFactory};
use crate::geometry::{Feature, Geometry, GeometryLayout};
use crate::height_info::{HeightInfo, HeightRegime};
use crate::placement::PlacementHandle;
use crate::primitive::{
    create_line_primitive_item, Appearance, ConvertedItem, GeometryInstance, Primitive,
    PrimitiveItem, PrimitiveKind,
};
use crate::style::{Color, Style};
use crate::terrain::{HeightQuery, QueryScope};
use crate::vector_properties::{NearFarScalar, PrimitiveOptions, VectorProperties};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HeightReference {
    None,
    ClampToGround,
    RelativeToGround,
}

impl HeightReference {
    pub fn from_height_info(height_info: &HeightInfo) -> Self {
        match height_info.regime {
            HeightRegime::Clamped => HeightReference::ClampToGround,
            HeightRegime::Relative {
                ground_level: None, ..
            } => HeightReference::RelativeToGround,
            _ => HeightReference::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillboardOptions {
    pub position: Cartesian3,
    pub image: String,
    pub scale: f64,
    pub color: Option<Color>,
    pub height_reference: HeightReference,
    pub eye_offset: Option<[f64; 3]>,
    pub scale_by_distance: Option<NearFarScalar>,
    /// The image is not decoded yet, size is unknown
    pub image_pending: bool,
    pub size: Option<[f64; 2]>,
    pub feature_id: Option<String>,
}

impl BillboardOptions {
    /// Completes a billboard created before its image was decoded.
    pub fn image_loaded(&mut self, size: [f64; 2]) {
        self.image_pending = false;
        self.size = Some(size);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelOptions {
    pub position: Cartesian3,
    pub text: String,
    pub font: Option<String>,
    pub fill_color: Color,
    pub outline_color: Option<Color>,
    pub outline_width: f64,
    pub pixel_offset: [f64; 2],
    pub scale: f64,
    pub height_reference: HeightReference,
    pub eye_offset: Option<[f64; 3]>,
    pub scale_by_distance: Option<NearFarScalar>,
    pub feature_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOptions {
    pub url: String,
    #[serde(rename = "modelMatrix")]
    pub placement: PlacementHandle,
    pub allow_picking: bool,
    pub feature_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct PointPrimitives {
    pub items: Vec<ConvertedItem>,
    pub height_queries: Vec<HeightQuery>,
}

struct PointContext<'a> {
    feature: &'a Feature,
    properties: &'a VectorProperties,
    height_info: &'a HeightInfo,
    options: PointOptions,
    needs_terrain: bool,
}

impl PointContext<'_> {
    fn position(&self) -> Cartesian3 {
        self.options.top()
    }

    /// Model placement at the top of the point: `T * ENU * HPR`, scaled and offset locally.
    fn model_placement(&self, offset: Vector3<f64>, auto_scale: bool) -> PlacementHandle {
        let [heading, pitch, roll] = self.properties.model_heading_pitch_roll(self.feature);
        let [x, y, z] = self.properties.model_scale(self.feature);
        let base = cartesian::east_north_up_to_fixed_frame(&self.position())
            * cartesian::heading_pitch_roll_rotation(heading, pitch, roll).to_homogeneous();
        PlacementHandle::new(base, Vector3::new(x, y, z), offset, auto_scale)
    }

    fn query(&self, scope: &QueryScope, placement: &PlacementHandle) -> Option<HeightQuery> {
        self.needs_terrain
            .then(|| HeightQuery::new(self.options.coordinate, scope, placement.clone()))
    }
}

/// Whether placements of this point wait for the terrain height: positions without a
/// known ground elevation.
fn needs_terrain_height(
    feature: &Feature,
    properties: &VectorProperties,
    height_info: &HeightInfo,
) -> bool {
    match height_info.regime {
        HeightRegime::Absolute { .. } => {
            height_info.layout == GeometryLayout::XY && properties.ground_level(feature).is_none()
        }
        HeightRegime::Relative { ground_level, .. } => ground_level.is_none(),
        HeightRegime::Clamped => false,
    }
}

fn create_billboard(context: &PointContext, style: &Style) -> Option<BillboardOptions> {
    let image = style.image.as_ref()?;
    Some(BillboardOptions {
        position: context.position(),
        image: image.src.clone(),
        scale: image.scale,
        color: image.color,
        height_reference: HeightReference::from_height_info(context.height_info),
        eye_offset: context.properties.eye_offset(context.feature),
        scale_by_distance: context.properties.scale_by_distance(context.feature),
        image_pending: !image.loaded,
        size: image.size,
        feature_id: context.feature.id.clone(),
    })
}

fn create_label(context: &PointContext, style: &Style) -> Option<LabelOptions> {
    if !style.has_text() {
        return None;
    }
    let text = style.text.as_ref()?;
    Some(LabelOptions {
        position: context.position(),
        text: text.text.clone(),
        font: text.font.clone(),
        fill_color: text.fill.as_ref().map_or(Color::BLACK, |fill| fill.color),
        outline_color: text.stroke.as_ref().map(|stroke| stroke.color),
        outline_width: text.stroke.as_ref().map_or(0.0, |stroke| stroke.width),
        pixel_offset: [text.offset_x, text.offset_y],
        scale: text.scale,
        height_reference: HeightReference::from_height_info(context.height_info),
        eye_offset: context.properties.eye_offset(context.feature),
        scale_by_distance: context.properties.scale_by_distance(context.feature),
        feature_id: context.feature.id.clone(),
    })
}

fn shape_primitive(
    context: &PointContext,
    primitive_options: &PrimitiveOptions,
    color: Color,
    outline: bool,
    placement: PlacementHandle,
) -> Primitive {
    Primitive {
        kind: PrimitiveKind::Primitive,
        geometry_instances: vec![GeometryInstance {
            geometry: EngineGeometry::Shape {
                shape: primitive_options.geometry.clone(),
                outline,
            },
            color,
            id: context.feature.id.clone(),
        }],
        appearance: Appearance::PerInstanceColor {
            flat: outline,
            translucent: color.is_translucent(),
        },
        depth_test: true,
        classification_type: None,
        allow_picking: context.properties.allow_picking(context.feature),
        feature_id: context.feature.id.clone(),
        placement: Some(placement),
    }
}

/// Converts a point geometry. Model wins over a custom primitive when both are declared.
pub fn get_point_primitives(
    feature: &Feature,
    style: &Style,
    geometry: &Geometry,
    height_info: &HeightInfo,
    properties: &VectorProperties,
    scope: &QueryScope,
) -> Result<PointPrimitives, ConvertError> {
    let context = PointContext {
        feature,
        properties,
        height_info,
        options: PointFactory.geometry_options(geometry, height_info)?,
        needs_terrain: needs_terrain_height(feature, properties, height_info),
    };
    let mut result = PointPrimitives::default();

    if let Some(billboard) = create_billboard(&context, style) {
        result.items.push(ConvertedItem::Billboard { item: billboard });
    }
    if let Some(label) = create_label(&context, style) {
        result.items.push(ConvertedItem::Label { item: label });
    }

    let model_url = properties.model_url(feature);
    let primitive_options = properties.primitive_options(feature);

    if let Some(url) = model_url {
        let auto_scale = properties.model_auto_scale(feature);
        let placement = context.model_placement(Vector3::zeros(), auto_scale);
        result.height_queries.extend(context.query(scope, &placement));
        result.items.push(ConvertedItem::Primitive {
            item: PrimitiveItem::Model(ModelOptions {
                url,
                placement,
                allow_picking: properties.allow_picking(feature),
                feature_id: feature.id.clone(),
            }),
            auto_scale,
        });
    } else if let Some(primitive_options) = &primitive_options {
        let auto_scale = primitive_options.auto_scale || properties.model_auto_scale(feature);
        let offset = primitive_options
            .offset
            .map_or_else(Vector3::zeros, |[x, y, z]| Vector3::new(x, y, z));
        let parts = [
            style.fill.as_ref().map(|fill| (fill.color, false)),
            style.stroke.as_ref().map(|stroke| (stroke.color, true)),
        ];
        for (color, outline) in parts.into_iter().flatten() {
            let placement = context.model_placement(offset, auto_scale);
            result.height_queries.extend(context.query(scope, &placement));
            result.items.push(ConvertedItem::Primitive {
                item: PrimitiveItem::Geometry(shape_primitive(
                    &context,
                    primitive_options,
                    color,
                    outline,
                    placement,
                )),
                auto_scale,
            });
        }
    }

    let renders_3d = properties.renders_as_model_or_primitive(feature);
    if let (true, true, Some(stroke)) = (renders_3d, height_info.extruded, &style.stroke) {
        let options = PointFactory.create_line_geometries(&context.options, height_info, stroke);
        if let Some(mut line) = create_line_primitive_item(feature, style, properties, &options) {
            let up = cartesian::geodetic_surface_normal(&context.options.base());
            let placement = PlacementHandle::vertical(up);
            result.height_queries.extend(context.query(scope, &placement));
            line.placement = Some(placement);
            result.items.push(ConvertedItem::Line { item: line });
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height_info::get_height_info;
    use crate::style::{ImageStyle, TextStyle};
    use crate::vector_properties::{
        ALTITUDE_MODE, EXTRUDED_HEIGHT, GROUND_LEVEL, MODEL_URL, PRIMITIVE_OPTIONS,
    };
    use serde_json::json;

    fn point(coordinates: Vec<f64>) -> Geometry {
        Geometry::Point { coordinates }
    }

    fn convert(feature: &Feature, style: &Style) -> PointPrimitives {
        let properties = VectorProperties::default();
        let geometry = feature.geometry.clone().unwrap();
        let height_info = get_height_info(feature, &geometry, &properties);
        get_point_primitives(
            feature,
            style,
            &geometry,
            &height_info,
            &properties,
            &QueryScope::new(),
        )
        .unwrap()
    }

    fn icon_and_text() -> Style {
        Style {
            image: Some(ImageStyle {
                src: "marker.png".to_string(),
                scale: 1.0,
                color: None,
                size: None,
                loaded: false,
            }),
            text: Some(TextStyle {
                text: "Marker".to_string(),
                font: None,
                fill: None,
                stroke: None,
                offset_x: 0.0,
                offset_y: -10.0,
                scale: 1.0,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn clamped_point_yields_clamped_billboard_and_label() {
        let feature = Feature::new(point(vec![10.0, 50.0]));
        let result = convert(&feature, &icon_and_text());
        assert_eq!(result.items.len(), 2);
        assert!(result.height_queries.is_empty());
        match &result.items[0] {
            ConvertedItem::Billboard { item } => {
                assert_eq!(item.height_reference, HeightReference::ClampToGround);
                assert!(item.image_pending);
            }
            other => panic!("expected a billboard, got {:?}", other),
        }
        assert!(matches!(
            &result.items[1],
            ConvertedItem::Label { item } if item.pixel_offset == [0.0, -10.0]
        ));
    }

    #[test]
    fn pending_image_is_completed_in_place() {
        let feature = Feature::new(point(vec![10.0, 50.0]));
        let mut result = convert(&feature, &icon_and_text());
        if let ConvertedItem::Billboard { item } = &mut result.items[0] {
            item.image_loaded([32.0, 32.0]);
            assert!(!item.image_pending);
            assert_eq!(item.size, Some([32.0, 32.0]));
        } else {
            panic!("expected a billboard");
        }
    }

    #[test]
    fn model_wins_over_primitive_and_queries_terrain() {
        let feature = Feature::new(point(vec![10.0, 50.0]))
            .with_property(MODEL_URL, json!("tree.glb"))
            .with_property(
                PRIMITIVE_OPTIONS,
                json!({ "geometry": { "type": "sphere", "radius": 1 } }),
            );
        let style = Style::default().with_fill(Color::WHITE);
        let result = convert(&feature, &style);
        assert_eq!(result.items.len(), 1);
        let ConvertedItem::Primitive {
            item: PrimitiveItem::Model(model),
            ..
        } = &result.items[0]
        else {
            panic!("expected a model");
        };
        assert_eq!(model.url, "tree.glb");
        // clamped with a model becomes relative without ground level
        assert_eq!(result.height_queries.len(), 1);
        assert!(result.height_queries[0].target().ptr_eq(&model.placement));
    }

    #[test]
    fn custom_primitive_gets_fill_and_outline_with_own_placements() {
        let feature = Feature::new(point(vec![10.0, 50.0, 5.0]))
            .with_property(ALTITUDE_MODE, json!("absolute"))
            .with_property(
                PRIMITIVE_OPTIONS,
                json!({ "geometry": { "type": "box", "dimensions": [1, 2, 3] }, "offset": [0, 0, 1.5] }),
            );
        let style = Style::default()
            .with_fill(Color::WHITE)
            .with_stroke(Color::BLACK, 1.0);
        let result = convert(&feature, &style);
        assert_eq!(result.items.len(), 2);
        // absolute with a height needs no terrain
        assert!(result.height_queries.is_empty());

        let placements: Vec<_> = result
            .items
            .iter()
            .filter_map(|item| item.primitive())
            .filter_map(|primitive| primitive.placement.clone())
            .collect();
        assert_eq!(placements.len(), 2);
        assert!(!placements[0].ptr_eq(&placements[1]));

        let expected = cartesian::from_degrees(10.0, 50.0, 6.5);
        assert!((placements[0].position() - expected).norm() < 1e-6);
    }

    #[test]
    fn extruded_model_with_stroke_adds_a_vertical_line() {
        let feature = Feature::new(point(vec![10.0, 50.0]))
            .with_property(ALTITUDE_MODE, json!("relativeToGround"))
            .with_property(GROUND_LEVEL, json!(100))
            .with_property(EXTRUDED_HEIGHT, json!(20))
            .with_property(MODEL_URL, json!("pin.glb"));
        let style = Style::default().with_stroke(Color::BLACK, 2.0);
        let result = convert(&feature, &style);
        assert_eq!(result.items.len(), 2);
        assert!(result.height_queries.is_empty());
        let ConvertedItem::Line { item } = &result.items[1] else {
            panic!("expected a line");
        };
        assert_eq!(item.geometry_instances.len(), 1);

        let ConvertedItem::Primitive {
            item: PrimitiveItem::Model(model),
            ..
        } = &result.items[0]
        else {
            panic!("expected a model");
        };
        let expected = cartesian::from_degrees(10.0, 50.0, 120.0);
        assert!((model.placement.position() - expected).norm() < 1e-6);
    }

    #[test]
    fn absolute_point_without_height_queries_terrain() {
        let feature = Feature::new(point(vec![10.0, 50.0]))
            .with_property(ALTITUDE_MODE, json!("absolute"))
            .with_property(MODEL_URL, json!("pin.glb"));
        let result = convert(&feature, &Style::default());
        assert_eq!(result.height_queries.len(), 1);

        let grounded = feature.with_property(GROUND_LEVEL, json!(3));
        assert!(convert(&grounded, &Style::default()).height_queries.is_empty());
    }
}
