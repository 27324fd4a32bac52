//! Built-in ISBN registration groups.
//!
//! Prefixes are hyphenated (`"978-3"`). Longer prefixes never nest inside a
//! shorter one in this table, so the derived identifier ranges are disjoint.

/// `(prefix, label)` pairs in ascending prefix order.
pub const REGISTRATION_GROUPS: &[(&str, &str)] = &[
    ("978-0", "English"),
    ("978-1", "English"),
    ("978-2", "French"),
    ("978-3", "German"),
    ("978-4", "Japan"),
    ("978-5", "Russia"),
    ("978-600", "Iran"),
    ("978-601", "Kazakhstan"),
    ("978-602", "Indonesia"),
    ("978-603", "Saudi Arabia"),
    ("978-604", "Vietnam"),
    ("978-605", "Turkey"),
    ("978-606", "Romania"),
    ("978-607", "Mexico"),
    ("978-608", "North Macedonia"),
    ("978-609", "Lithuania"),
    ("978-611", "Thailand"),
    ("978-612", "Peru"),
    ("978-613", "Mauritius"),
    ("978-614", "Lebanon"),
    ("978-615", "Hungary"),
    ("978-616", "Thailand"),
    ("978-617", "Ukraine"),
    ("978-618", "Greece"),
    ("978-619", "Bulgaria"),
    ("978-65", "Brazil"),
    ("978-7", "China"),
    ("978-80", "Czech Republic and Slovakia"),
    ("978-81", "India"),
    ("978-82", "Norway"),
    ("978-83", "Poland"),
    ("978-84", "Spain"),
    ("978-85", "Brazil"),
    ("978-86", "Serbia"),
    ("978-87", "Denmark"),
    ("978-88", "Italy"),
    ("978-89", "South Korea"),
    ("978-90", "Netherlands"),
    ("978-91", "Sweden"),
    ("978-92", "International NGO Publishers"),
    ("978-93", "India"),
    ("978-94", "Netherlands"),
    ("978-950", "Argentina"),
    ("978-951", "Finland"),
    ("978-952", "Finland"),
    ("978-953", "Croatia"),
    ("978-954", "Bulgaria"),
    ("978-955", "Sri Lanka"),
    ("978-956", "Chile"),
    ("978-957", "Taiwan"),
    ("978-958", "Colombia"),
    ("978-959", "Cuba"),
    ("978-960", "Greece"),
    ("978-961", "Slovenia"),
    ("978-962", "Hong Kong"),
    ("978-963", "Hungary"),
    ("978-964", "Iran"),
    ("978-965", "Israel"),
    ("978-966", "Ukraine"),
    ("978-967", "Malaysia"),
    ("978-968", "Mexico"),
    ("978-969", "Pakistan"),
    ("978-970", "Mexico"),
    ("978-971", "Philippines"),
    ("978-972", "Portugal"),
    ("978-973", "Romania"),
    ("978-974", "Thailand"),
    ("978-975", "Turkey"),
    ("978-976", "Caribbean Community"),
    ("978-977", "Egypt"),
    ("978-978", "Nigeria"),
    ("978-979", "Indonesia"),
    ("978-980", "Venezuela"),
    ("978-981", "Singapore"),
    ("978-982", "South Pacific"),
    ("978-983", "Malaysia"),
    ("978-984", "Bangladesh"),
    ("978-985", "Belarus"),
    ("978-986", "Taiwan"),
    ("978-987", "Argentina"),
    ("978-988", "Hong Kong"),
    ("978-989", "Portugal"),
    ("979-10", "France"),
    ("979-11", "South Korea"),
    ("979-12", "Italy"),
    ("979-8", "United States"),
];
