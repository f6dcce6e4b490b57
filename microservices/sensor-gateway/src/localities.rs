//! Bangalore locality catalogue served to clients

use surge_core::{Coords, Locality};

const BANGALORE: [(&str, f64, f64); 20] = [
    ("Koramangala", 12.9352, 77.6245),
    ("Indiranagar", 12.9716, 77.6412),
    ("Whitefield", 12.9698, 77.7499),
    ("Jayanagar", 12.9250, 77.5838),
    ("MG Road", 12.9750, 77.6062),
    ("Electronic City", 12.8456, 77.6603),
    ("HSR Layout", 12.9116, 77.6473),
    ("Marathahalli", 12.9591, 77.6974),
    ("BTM Layout", 12.9165, 77.6101),
    ("Yelahanka", 13.1007, 77.5963),
    ("Bannerghatta Road", 12.8889, 77.5958),
    ("Rajajinagar", 12.9910, 77.5552),
    ("Malleshwaram", 13.0033, 77.5703),
    ("JP Nagar", 12.9081, 77.5856),
    ("Bellandur", 12.9259, 77.6751),
    ("Sarjapur Road", 12.9107, 77.7085),
    ("Hebbal", 13.0358, 77.5970),
    ("Banashankari", 12.9250, 77.5482),
    ("Bommanahalli", 12.9141, 77.6269),
    ("KR Puram", 13.0117, 77.6961),
];

pub fn bangalore() -> Vec<Locality> {
    BANGALORE
        .iter()
        .map(|(name, latitude, longitude)| Locality::new(*name, Coords::new(*latitude, *longitude)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_is_complete_and_unique() {
        let all = bangalore();
        assert_eq!(all.len(), 20);

        let names: HashSet<_> = all.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn test_coordinates_are_in_bangalore() {
        for locality in bangalore() {
            assert!((12.8..13.2).contains(&locality.coords.latitude), "{}", locality.name);
            assert!((77.5..77.8).contains(&locality.coords.longitude), "{}", locality.name);
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let hebbal = bangalore().into_iter().find(|l| l.name == "Hebbal");
        assert_eq!(hebbal.map(|l| l.coords), Some(Coords::new(13.0358, 77.5970)));
    }
}
