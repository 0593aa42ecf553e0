// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline tests over a synthetic multi-storey model.

use ifc_store_core::{
    parse, read_store, write_store, ColumnarParser, ParseOptions, PropertyValue, RelKind,
};

/// Build a synthetic model: a project with two storeys, `walls_per_storey`
/// walls each, a shared property set and per-wall quantities.
fn synthetic_model(walls_per_storey: u32) -> String {
    let mut out = String::from(
        "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n",
    );
    out.push_str("#1=IFCPROJECT('P-GUID',$,'Tower',$,$,$,$,$,$);\n");
    out.push_str("#2=IFCSITE('S-GUID',$,'Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);\n");
    out.push_str("#3=IFCBUILDING('B-GUID',$,'Block A',$,$,$,$,$,.ELEMENT.,$,$,$);\n");
    out.push_str("#4=IFCBUILDINGSTOREY('ST0',$,'EG',$,$,$,$,$,.ELEMENT.,0.);\n");
    out.push_str("#5=IFCBUILDINGSTOREY('ST1',$,'OG1',$,$,$,$,$,.ELEMENT.,3.2);\n");
    out.push_str("#40=IFCRELAGGREGATES('AG1',$,$,$,#1,(#2));\n");
    out.push_str("#41=IFCRELAGGREGATES('AG2',$,$,$,#2,(#3));\n");
    out.push_str("#42=IFCRELAGGREGATES('AG3',$,$,$,#3,(#4,#5));\n");
    out.push_str("#50=IFCSIUNIT(*,.AREAUNIT.,$,.SQUARE_METRE.);\n");
    out.push_str("#60=IFCPROPERTYSINGLEVALUE('FireRating',$,IFCTEXT('F90'),$);\n");
    out.push_str("#61=IFCPROPERTYSINGLEVALUE('LoadBearing',$,IFCBOOLEAN(.T.),$);\n");
    out.push_str("#62=IFCPROPERTYSET('PS-GUID',$,'Pset_WallCommon',$,(#60,#61));\n");

    let mut next = 1000u32;
    for (storey, storey_id) in [(0u32, 4u32), (1, 5)] {
        let mut contained = Vec::new();
        for w in 0..walls_per_storey {
            let wall = next;
            let qty = next + 1;
            let qset = next + 2;
            next += 10;
            out.push_str(&format!(
                "#{wall}=IFCWALL('W{storey}-{w}',$,'Wall {storey}.{w}',$,$,$,$,$,$);\n"
            ));
            out.push_str(&format!(
                "#{qty}=IFCQUANTITYAREA('NetSideArea',$,#50,2.,$);\n"
            ));
            out.push_str(&format!(
                "#{qset}=IFCELEMENTQUANTITY('Q{wall}',$,'BaseQuantities',$,$,(#{qty}));\n"
            ));
            out.push_str(&format!(
                "#{}=IFCRELDEFINESBYPROPERTIES('RQ{wall}',$,$,$,(#{wall}),#{qset});\n",
                next
            ));
            next += 1;
            out.push_str(&format!(
                "#{}=IFCRELDEFINESBYPROPERTIES('RP{wall}',$,$,$,(#{wall}),#62);\n",
                next
            ));
            next += 1;
            contained.push(format!("#{wall}"));
        }
        out.push_str(&format!(
            "#{}=IFCRELCONTAINEDINSPATIALSTRUCTURE('CN{storey}',$,$,$,({}),#{storey_id});\n",
            next,
            contained.join(",")
        ));
        next += 1;
    }
    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
    out
}

#[test]
fn full_pipeline_on_synthetic_model() {
    let content = synthetic_model(25);
    let store = parse(&content).unwrap();

    let walls = store.entities.get_by_type("IfcWall");
    assert_eq!(walls.len(), 50);
    // Scan order within the type range is ascending.
    assert!(walls.windows(2).all(|w| w[0] < w[1]));

    let first = walls[0];
    assert_eq!(store.entities.name(first), Some("Wall 0.0"));
    assert_eq!(store.entities.type_name(first), Some("IfcWall"));
    assert_eq!(store.entities.contained_in_storey(first), Some(4));

    // Every wall carries the shared property set.
    assert_eq!(
        store.properties.get_value(first, "Pset_WallCommon", "FireRating"),
        Some(PropertyValue::Text("F90"))
    );
    assert_eq!(
        store.properties.get_value(first, "Pset_WallCommon", "LoadBearing"),
        Some(PropertyValue::Boolean(true))
    );

    // 50 walls x 2.0 each.
    assert_eq!(store.quantities.sum_by_type("NetSideArea"), 100.0);
    assert_eq!(store.sum_quantity_by_type("NetSideArea", Some("IfcWall")), 100.0);
    assert_eq!(store.sum_quantity_by_type("NetSideArea", Some("IfcSlab")), 0.0);

    // Quantity rows resolve the SI unit symbol.
    let qsets = store.quantities.get_for_entity(first);
    assert_eq!(qsets[0].quantities[0].unit, Some("m²"));

    // Containment edges: 25 per storey.
    assert_eq!(
        store
            .relationships
            .related(4, RelKind::ContainedInStructure)
            .len(),
        25
    );

    // Spatial hierarchy.
    let spatial = store.spatial.as_ref().unwrap();
    assert_eq!(spatial.project_id(), 1);
    assert_eq!(spatial.storeys(), vec![4, 5]);
    assert_eq!(spatial.path(5).as_deref(), Some("Tower/Site/Block A/OG1"));
    assert_eq!(spatial.node(4).unwrap().elements.len(), 25);
}

#[test]
fn cache_round_trip_preserves_every_accessor() {
    let content = synthetic_model(8);
    let store = parse(&content).unwrap();
    let restored = read_store(&write_store(&store)).unwrap();

    assert_eq!(restored.entity_count, store.entity_count);
    assert_eq!(restored.file_size, store.file_size);

    for &id in store.entities.express_ids() {
        assert_eq!(restored.entities.global_id(id), store.entities.global_id(id));
        assert_eq!(restored.entities.name(id), store.entities.name(id));
        assert_eq!(restored.entities.type_name(id), store.entities.type_name(id));
        assert_eq!(restored.entities.has_geometry(id), store.entities.has_geometry(id));
        assert_eq!(
            restored.entities.contained_in_storey(id),
            store.entities.contained_in_storey(id)
        );
        assert_eq!(
            restored.properties.get_for_entity(id),
            store.properties.get_for_entity(id)
        );
        assert_eq!(
            restored.quantities.get_for_entity(id),
            store.quantities.get_for_entity(id)
        );
    }
    for type_name in store.entities.type_names() {
        assert_eq!(
            restored.entities.get_by_type(type_name),
            store.entities.get_by_type(type_name)
        );
    }
    assert_eq!(
        restored.quantities.sum_by_type("NetSideArea"),
        store.quantities.sum_by_type("NetSideArea")
    );
    assert_eq!(
        restored.spatial.as_ref().unwrap().storeys(),
        store.spatial.as_ref().unwrap().storeys()
    );
}

#[test]
fn header_noise_and_duplicates_are_tolerated() {
    // Header lines, comments, a duplicate id and a dangling reference.
    let content = "\
ISO-10303-21;
HEADER;
FILE_NAME('x.ifc','2024-01-01',(''),(''),'pre','app','');
ENDSEC;
DATA;
/* comment with #999 = not a record */
#7=IFCWALL('OLD',$,'Old name',$,$,$,$,$,$);
#7=IFCWALL('NEW',$,'New name',$,$,$,$,$,$);
#8=IFCRELCONTAINEDINSPATIALSTRUCTURE('C',$,$,$,(#7,#12345),#7);
ENDSEC;
";
    let store = parse(content).unwrap();
    // Last declaration of #7 wins.
    assert_eq!(store.entities.name(7), Some("New name"));
    assert_eq!(store.entity_count, 2);
    // The resolvable edge survives, the dangling one is omitted.
    assert_eq!(
        store.relationships.related(7, RelKind::ContainedInStructure),
        &[7]
    );
}

#[test]
fn progress_callback_throttling() {
    use std::sync::{Arc, Mutex};
    let content = synthetic_model(40);
    let events: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let options = ParseOptions {
        on_progress: Some(Box::new(move |phase, pct| {
            if phase == ifc_store_core::ParsePhase::Extract {
                sink.lock().unwrap().push(pct);
            }
        })),
        progress_every: 50,
    };
    ColumnarParser::with_options(options).parse(&content).unwrap();

    let events = events.lock().unwrap();
    // 0 and 100 always, plus a throttled number of intermediate updates:
    // far fewer than one per entity.
    assert_eq!(*events.first().unwrap(), 0.0);
    assert_eq!(*events.last().unwrap(), 100.0);
    assert!(events.len() < 20, "too many progress events: {}", events.len());
    assert!(events.windows(2).all(|w| w[0] <= w[1]));
}
