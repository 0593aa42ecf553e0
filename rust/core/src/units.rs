// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit symbol resolution for quantity rows.
//!
//! Quantities may reference an IFCSIUNIT or IFCCONVERSIONBASEDUNIT; this
//! module turns those records into display symbols (`mm`, `m²`, `kg`) and
//! exposes the SI prefix multipliers defined by the IFC specification.

use crate::decoder::DecodedEntity;

/// SI prefix multiplier for an IfcSIPrefix enum token.
/// Unknown or absent prefixes resolve to the base unit.
#[inline]
pub fn si_prefix_multiplier(prefix: &str) -> f64 {
    match prefix {
        "ATTO" => 1e-18,
        "FEMTO" => 1e-15,
        "PICO" => 1e-12,
        "NANO" => 1e-9,
        "MICRO" => 1e-6,
        "MILLI" => 1e-3,
        "CENTI" => 1e-2,
        "DECI" => 1e-1,
        "DECA" => 1e1,
        "HECTO" => 1e2,
        "KILO" => 1e3,
        "MEGA" => 1e6,
        "GIGA" => 1e9,
        "TERA" => 1e12,
        "PETA" => 1e15,
        "EXA" => 1e18,
        _ => 1.0,
    }
}

/// Short prefix symbol for an IfcSIPrefix enum token.
fn si_prefix_symbol(prefix: &str) -> &'static str {
    match prefix {
        "MILLI" => "m",
        "CENTI" => "c",
        "DECI" => "d",
        "KILO" => "k",
        "MEGA" => "M",
        "GIGA" => "G",
        "MICRO" => "µ",
        "NANO" => "n",
        _ => "",
    }
}

/// Symbol for an IfcSIUnitName enum token.
fn si_unit_symbol(name: &str) -> &str {
    match name {
        "METRE" => "m",
        "SQUARE_METRE" => "m²",
        "CUBIC_METRE" => "m³",
        "GRAM" => "g",
        "SECOND" => "s",
        "KELVIN" => "K",
        "AMPERE" => "A",
        "WATT" => "W",
        "NEWTON" => "N",
        "PASCAL" => "Pa",
        "HERTZ" => "Hz",
        "JOULE" => "J",
        "LUMEN" => "lm",
        "LUX" => "lx",
        "RADIAN" => "rad",
        "STERADIAN" => "sr",
        "DEGREE_CELSIUS" => "°C",
        other => other,
    }
}

/// Resolve a unit record to a display symbol.
///
/// IFCSIUNIT: [0]=Dimensions (*), [1]=UnitType, [2]=Prefix, [3]=Name.
/// IFCCONVERSIONBASEDUNIT: [2]=Name.
pub fn unit_symbol(unit: &DecodedEntity) -> Option<String> {
    match unit.type_name.to_ascii_uppercase().as_str() {
        "IFCSIUNIT" => {
            let prefix = unit.get_enum(2).unwrap_or("");
            let name = unit.get_enum(3)?;
            Some(format!(
                "{}{}",
                si_prefix_symbol(prefix),
                si_unit_symbol(name)
            ))
        }
        "IFCCONVERSIONBASEDUNIT" => unit.get_string(2).map(|s| s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::parse_record;

    #[test]
    fn test_prefix_multipliers() {
        assert_eq!(si_prefix_multiplier("MILLI"), 1e-3);
        assert_eq!(si_prefix_multiplier("KILO"), 1e3);
        assert_eq!(si_prefix_multiplier(""), 1.0);
        assert_eq!(si_prefix_multiplier("BOGUS"), 1.0);
    }

    #[test]
    fn test_si_unit_symbol() {
        let unit = parse_record("#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.)").unwrap();
        assert_eq!(unit_symbol(&unit), Some("mm".to_string()));

        let unit = parse_record("#4=IFCSIUNIT(*,.AREAUNIT.,$,.SQUARE_METRE.)").unwrap();
        assert_eq!(unit_symbol(&unit), Some("m²".to_string()));
    }

    #[test]
    fn test_conversion_based_unit() {
        let unit =
            parse_record("#5=IFCCONVERSIONBASEDUNIT(#1,.LENGTHUNIT.,'INCH',#2)").unwrap();
        assert_eq!(unit_symbol(&unit), Some("INCH".to_string()));
    }

    #[test]
    fn test_unknown_unit_type() {
        let unit = parse_record("#6=IFCMONETARYUNIT('EUR')").unwrap();
        assert_eq!(unit_symbol(&unit), None);
    }
}
