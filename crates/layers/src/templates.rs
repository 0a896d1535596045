//! The fixed layer set that draws every consolidated domain.
//!
//! Four templates (circle, symbol, fill, line) read all styling from feature
//! properties, so adding a domain never adds a layer.

use serde_json::{Value, json};

use crate::consolidate::props;
use crate::layer::{LayerConfig, LayerKind};
use crate::symbology::Level;

pub const POINTS_SOURCE: &str = "consolidated-points";
pub const POLYGONS_SOURCE: &str = "consolidated-polygons";

pub const CIRCLE_LAYER: &str = "consolidated-circle";
pub const SYMBOL_LAYER: &str = "consolidated-symbol";
pub const FILL_LAYER: &str = "consolidated-fill";
pub const LINE_LAYER: &str = "consolidated-line";

/// Level color when the feature has a level, else its own `color`.
pub fn level_color_expression() -> Value {
    let mut expr = vec![json!("match"), json!(["get", props::LEVEL])];
    for level in Level::ALL {
        expr.push(json!(level.as_str()));
        expr.push(json!(level.color()));
    }
    expr.push(json!(["get", props::COLOR]));
    Value::Array(expr)
}

/// `base` scaled by the feature's size multiplier.
pub fn scaled_size_expression(base: f64) -> Value {
    json!(["*", base, ["coalesce", ["get", props::SIZE_MULTIPLIER], 1.0]])
}

pub fn circle_template() -> LayerConfig {
    LayerConfig::new(CIRCLE_LAYER, LayerKind::Circle, POINTS_SOURCE)
        .paint("circle-color", level_color_expression())
        .paint("circle-radius", scaled_size_expression(7.0))
        .paint("circle-stroke-width", json!(1.5))
        .paint("circle-stroke-color", json!("#ffffff"))
        .paint("circle-opacity", json!(0.9))
}

pub fn symbol_template() -> LayerConfig {
    LayerConfig::new(SYMBOL_LAYER, LayerKind::Symbol, POINTS_SOURCE)
        .layout("icon-image", json!(["get", props::SYMBOL]))
        .layout("icon-size", scaled_size_expression(0.8))
        .layout("icon-allow-overlap", json!(true))
}

pub fn fill_template() -> LayerConfig {
    LayerConfig::new(FILL_LAYER, LayerKind::Fill, POLYGONS_SOURCE)
        .filter(json!(["==", ["geometry-type"], "Polygon"]))
        .paint("fill-color", level_color_expression())
        .paint("fill-opacity", json!(0.25))
}

pub fn line_template() -> LayerConfig {
    LayerConfig::new(LINE_LAYER, LayerKind::Line, POLYGONS_SOURCE)
        .paint("line-color", level_color_expression())
        .paint("line-width", scaled_size_expression(2.0))
}

pub fn consolidated_templates() -> Vec<LayerConfig> {
    vec![
        fill_template(),
        line_template(),
        circle_template(),
        symbol_template(),
    ]
}

#[cfg(test)]
mod tests {
    use super::{POINTS_SOURCE, POLYGONS_SOURCE, consolidated_templates, level_color_expression};
    use crate::layer::LayerKind;
    use serde_json::json;

    #[test]
    fn one_template_per_layer_kind() {
        let templates = consolidated_templates();
        let kinds: Vec<LayerKind> = templates.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![LayerKind::Fill, LayerKind::Line, LayerKind::Circle, LayerKind::Symbol]
        );
        for t in &templates {
            let expected = match t.kind {
                LayerKind::Circle | LayerKind::Symbol => POINTS_SOURCE,
                _ => POLYGONS_SOURCE,
            };
            assert_eq!(t.source, expected, "{}", t.id);
        }
    }

    #[test]
    fn color_expression_falls_back_to_feature_color() {
        let expr = level_color_expression();
        let items = expr.as_array().unwrap();
        assert_eq!(items[0], json!("match"));
        assert_eq!(items[2], json!("critical"));
        assert_eq!(items[3], json!("#dc2626"));
        assert_eq!(items.last(), Some(&json!(["get", "color"])));
    }

    #[test]
    fn templates_serialize_as_renderer_layer_specs() {
        let json = serde_json::to_value(super::circle_template()).unwrap();
        assert_eq!(json["type"], "circle");
        assert_eq!(json["source"], POINTS_SOURCE);
        assert!(json.get("layout").is_none());
    }
}
