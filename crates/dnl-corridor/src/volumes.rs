//! The corridor's OD demand table.
//!
//! Hourly volumes for all 56 OD movements, each with its origin and
//! destination centroid.  Row order is load order: ODs draw their Poisson
//! demand from the shared episode RNG in exactly this sequence, so the
//! table order is part of the reproducibility contract.

/// One OD movement: label, origin node, destination node, veh/hr.
pub struct OdVolume {
    pub name:        &'static str,
    pub origin:      u32,
    pub destination: u32,
    pub hourly:      f64,
}

const fn od(name: &'static str, origin: u32, destination: u32, hourly: f64) -> OdVolume {
    OdVolume { name, origin, destination, hourly }
}

/// All OD movements in demand-draw order.
pub const OD_VOLUMES: [OdVolume; 56] = [
    // From the north freeway.
    od("nFwy", 0, 8, 3000.0),
    od("n2e", 0, 10, 400.0),
    od("n2w", 0, 11, 400.0),
    od("n2ne", 0, 12, 100.0),
    od("n2nw", 0, 14, 100.0),
    od("n2se", 0, 13, 100.0),
    od("n2sw", 0, 15, 100.0),
    // From the south freeway.
    od("sFwy", 1, 9, 3000.0),
    od("s2e", 1, 10, 400.0),
    od("s2w", 1, 11, 400.0),
    od("s2ne", 1, 12, 100.0),
    od("s2nw", 1, 14, 100.0),
    od("s2se", 1, 13, 100.0),
    od("s2sw", 1, 15, 100.0),
    // From the westbound cross street.
    od("e2w", 3, 11, 1000.0),
    od("e2n", 3, 8, 400.0),
    od("e2s", 3, 9, 400.0),
    od("e2ne", 3, 12, 100.0),
    od("e2nw", 3, 14, 100.0),
    od("e2se", 3, 13, 100.0),
    od("e2sw", 3, 15, 100.0),
    // From the eastbound cross street.
    od("w2e", 2, 10, 1000.0),
    od("w2n", 2, 8, 400.0),
    od("w2s", 2, 9, 400.0),
    od("w2ne", 2, 12, 100.0),
    od("w2nw", 2, 14, 100.0),
    od("w2se", 2, 13, 100.0),
    od("w2sw", 2, 15, 100.0),
    // From the north-east collector.
    od("ne2n", 5, 8, 50.0),
    od("ne2s", 5, 9, 50.0),
    od("ne2e", 5, 10, 30.0),
    od("ne2w", 5, 11, 30.0),
    od("ne2nw", 5, 14, 10.0),
    od("ne2se", 5, 13, 10.0),
    od("ne2sw", 5, 15, 10.0),
    // From the north-west collector.
    od("nw2n", 7, 8, 50.0),
    od("nw2s", 7, 9, 50.0),
    od("nw2e", 7, 10, 30.0),
    od("nw2w", 7, 11, 30.0),
    od("nw2ne", 7, 12, 10.0),
    od("nw2se", 7, 13, 10.0),
    od("nw2sw", 7, 15, 10.0),
    // From the south-east collector.
    od("se2n", 4, 8, 50.0),
    od("se2s", 4, 9, 50.0),
    od("se2e", 4, 10, 30.0),
    od("se2w", 4, 11, 30.0),
    od("se2ne", 4, 12, 10.0),
    od("se2nw", 4, 14, 10.0),
    od("se2sw", 4, 15, 10.0),
    // From the south-west collector.
    od("sw2n", 6, 8, 50.0),
    od("sw2s", 6, 9, 50.0),
    od("sw2e", 6, 10, 30.0),
    od("sw2w", 6, 11, 30.0),
    od("sw2ne", 6, 12, 10.0),
    od("sw2nw", 6, 14, 10.0),
    od("sw2se", 6, 13, 10.0),
];
