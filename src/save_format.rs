use crate::error::{Result, SaveError};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use std::path::Path;

const ROOT_ELEMENT: &str = "SaveGame";
const MS_PER_MINUTE: i64 = 1000 * 60;
const MS_PER_HOUR: i64 = MS_PER_MINUTE * 60;

/// Gameplay fields pulled out of a main save file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveMetadata {
    #[allow(dead_code)]
    pub unique_id: String,
    pub player_name: String,
    pub farm_name: String,
    pub money: i64,
    pub level: i32,
    pub milliseconds_played: i64,
    pub day_of_month: i32,
    pub season: String,
    pub year: i32,
    #[allow(dead_code)]
    pub time_of_day: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SaveGameDocument {
    player: PlayerDocument,
    #[serde(rename = "uniqueIDForThisGame")]
    unique_id: String,
    #[serde(rename = "dayOfMonth")]
    day_of_month: i32,
    #[serde(rename = "currentSeason")]
    season: String,
    year: i32,
    #[serde(rename = "timeOfDay")]
    time_of_day: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlayerDocument {
    name: String,
    #[serde(rename = "farmName")]
    farm_name: String,
    money: i64,
    level: i32,
    #[serde(rename = "millisecondsPlayed")]
    milliseconds_played: i64,
}

impl From<SaveGameDocument> for SaveMetadata {
    fn from(doc: SaveGameDocument) -> Self {
        SaveMetadata {
            unique_id: doc.unique_id,
            player_name: doc.player.name,
            farm_name: doc.player.farm_name,
            money: doc.player.money,
            level: doc.player.level,
            milliseconds_played: doc.player.milliseconds_played,
            day_of_month: doc.day_of_month,
            season: doc.season,
            year: doc.year,
            time_of_day: doc.time_of_day,
        }
    }
}

pub fn parse(file_path: &Path) -> Result<SaveMetadata> {
    let bytes = std::fs::read(file_path)
        .map_err(|e| SaveError::io(format!("read {}", file_path.display()), e))?;
    parse_bytes(&bytes)
}

pub fn parse_bytes(bytes: &[u8]) -> Result<SaveMetadata> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SaveError::Decode(format!("save file is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let root = root_element(text)?;
    if root != ROOT_ELEMENT {
        return Err(SaveError::Decode(format!(
            "unexpected root element <{root}>, expected <{ROOT_ELEMENT}>"
        )));
    }

    let doc: SaveGameDocument = quick_xml::de::from_str(text)?;
    Ok(doc.into())
}

fn root_element(text: &str) -> Result<String> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(SaveError::Decode("document has no root element".to_string()));
            }
            Ok(_) => {}
            Err(e) => return Err(SaveError::Decode(e.to_string())),
        }
    }
}

#[must_use]
pub fn format_play_duration(milliseconds: i64) -> String {
    if milliseconds <= 0 {
        return "0 hours".to_string();
    }

    let hours = milliseconds / MS_PER_HOUR;
    let minutes = (milliseconds % MS_PER_HOUR) / MS_PER_MINUTE;

    if hours > 0 {
        format!("{} {}", plural(hours, "hour"), plural(minutes, "minute"))
    } else {
        plural(minutes, "minute")
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal save document shaped like the game writes it.
    pub(crate) fn save_xml(farmer: &str, farm: &str, money: i64, day: i32, season: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<SaveGame xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <player>
    <name>{farmer}</name>
    <farmName>{farm}</farmName>
    <money>{money}</money>
    <level>3</level>
    <millisecondsPlayed>3661000</millisecondsPlayed>
    <items><Item><name>Parsnip</name></Item></items>
  </player>
  <uniqueIDForThisGame>351920664</uniqueIDForThisGame>
  <dayOfMonth>{day}</dayOfMonth>
  <currentSeason>{season}</currentSeason>
  <year>2</year>
  <timeOfDay>1210</timeOfDay>
</SaveGame>"#
        )
    }

    #[test]
    fn test_parse_full_document() {
        let xml = save_xml("Abigail", "Sunny", 5000, 12, "spring");
        let meta = parse_bytes(xml.as_bytes()).unwrap();
        assert_eq!(meta.player_name, "Abigail");
        assert_eq!(meta.farm_name, "Sunny");
        assert_eq!(meta.money, 5000);
        assert_eq!(meta.level, 3);
        assert_eq!(meta.day_of_month, 12);
        assert_eq!(meta.season, "spring");
        assert_eq!(meta.year, 2);
        assert_eq!(meta.time_of_day, 1210);
        assert_eq!(meta.milliseconds_played, 3_661_000);
        assert_eq!(meta.unique_id, "351920664");
    }

    #[test]
    fn test_parse_tolerates_bom_and_missing_fields() {
        let xml = "\u{feff}<SaveGame><player><name>Sam</name></player></SaveGame>";
        let meta = parse_bytes(xml.as_bytes()).unwrap();
        assert_eq!(meta.player_name, "Sam");
        assert_eq!(meta.money, 0);
        assert_eq!(meta.season, "");
    }

    #[test]
    fn test_parse_rejects_wrong_root() {
        let err = parse_bytes(b"<Farmer><name>x</name></Farmer>").unwrap_err();
        assert!(matches!(err, SaveError::Decode(_)));
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        let err = parse_bytes(b"<SaveGame><player><name>x</player>").unwrap_err();
        assert!(matches!(err, SaveError::Decode(_)));

        let err = parse_bytes(b"not xml at all").unwrap_err();
        assert!(matches!(err, SaveError::Decode(_)));
    }

    #[test]
    fn test_parse_rejects_non_numeric_money() {
        let xml = "<SaveGame><player><money>lots</money></player></SaveGame>";
        assert!(matches!(
            parse_bytes(xml.as_bytes()),
            Err(SaveError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }

    #[test]
    fn test_format_play_duration() {
        assert_eq!(format_play_duration(0), "0 hours");
        assert_eq!(format_play_duration(-5), "0 hours");
        assert_eq!(format_play_duration(3_661_000), "1 hour 1 minute");
        assert_eq!(format_play_duration(45 * 60 * 1000), "45 minutes");
        assert_eq!(format_play_duration(2 * 3_600_000), "2 hours 0 minutes");
        assert_eq!(format_play_duration(30_000), "0 minutes");
    }
}
