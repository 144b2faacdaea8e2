//! Demo data set loaded at startup.

use super::{GroupRow, Tables, UserRow};

const USERS: &[(u32, &str, &str)] = &[
    (1, "Alice", "it"),
    (2, "Bob", "us"),
    (3, "Charlie", "fr"),
    (4, "Duana", "au"),
    (5, "Eve", "uk"),
    (6, "Frank", "es"),
    (7, "Grace", "de"),
    (8, "Heidi", "ch"),
    (9, "Irene", "ar"),
];

const GROUPS: &[(u32, &str, &[u32])] = &[
    (10, "Gamers", &[1, 2, 3]),
    (11, "Guitar Players", &[4, 5, 6]),
    (12, "Snowboarders", &[7, 8, 9]),
    (13, "Divers", &[3, 6, 9]),
    (14, "Surfers", &[2, 4, 6]),
    (15, "Bikers", &[1, 3, 5]),
    (16, "Basketball Players", &[4, 7, 8]),
];

const COUNTRIES: &[(&str, &str)] = &[
    ("it", "Italy"),
    ("us", "United States"),
    ("fr", "France"),
    ("de", "Germany"),
    ("es", "Spain"),
    ("uk", "United Kingdom"),
    ("ch", "Switzerland"),
    ("au", "Australia"),
    ("nz", "New Zealand"),
    ("ca", "Canada"),
    ("jp", "Japan"),
    ("cn", "China"),
    ("br", "Brazil"),
    ("mx", "Mexico"),
    ("ar", "Argentina"),
    ("cl", "Chile"),
    ("ru", "Russia"),
    ("in", "India"),
    ("kr", "South Korea"),
    ("th", "Thailand"),
    ("sa", "South Africa"),
    ("eg", "Egypt"),
    ("gr", "Greece"),
    ("pt", "Portugal"),
    ("pl", "Poland"),
    ("ro", "Romania"),
    ("tr", "Turkey"),
    ("dk", "Denmark"),
    ("fi", "Finland"),
    ("no", "Norway"),
    ("se", "Sweden"),
    ("ie", "Ireland"),
    ("is", "Iceland"),
    ("at", "Austria"),
    ("be", "Belgium"),
    ("bg", "Bulgaria"),
    ("hr", "Croatia"),
    ("cz", "Czech Republic"),
];

pub(super) fn tables() -> Tables {
    Tables {
        users: USERS
            .iter()
            .map(|(id, name, country)| {
                (
                    *id,
                    UserRow {
                        name: name.to_string(),
                        country: country.to_string(),
                    },
                )
            })
            .collect(),
        groups: GROUPS
            .iter()
            .map(|(id, name, users)| {
                (
                    *id,
                    GroupRow {
                        name: name.to_string(),
                        users: users.to_vec(),
                    },
                )
            })
            .collect(),
        countries: COUNTRIES
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect(),
    }
}
