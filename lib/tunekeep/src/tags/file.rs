//! Reading and applying persisted tags from/to `lofty` file tags.

use lofty::picture::{Picture, PictureType};
use lofty::tag::{ItemKey, ItemValue, Tag as FileTag, TagItem};
use tracing::debug;

use super::{names, Tag, TagDescriptor, TagKind, TagValue, ValueKind};
use crate::error::Result;

/// Item key backing a persisted text/list/number tag. Artwork lives in the picture list.
fn item_key(name: &str) -> Option<ItemKey> {
    match name {
        names::TITLE => Some(ItemKey::TrackTitle),
        names::SUBTITLE => Some(ItemKey::TrackSubtitle),
        names::PERFORMERS => Some(ItemKey::TrackArtist),
        names::ALBUM => Some(ItemKey::AlbumTitle),
        names::ALBUM_ARTISTS => Some(ItemKey::AlbumArtist),
        names::GENRES => Some(ItemKey::Genre),
        names::COMPOSERS => Some(ItemKey::Composer),
        names::YEAR => Some(ItemKey::Year),
        names::TRACK => Some(ItemKey::TrackNumber),
        names::TRACK_COUNT => Some(ItemKey::TrackTotal),
        names::DISC => Some(ItemKey::DiscNumber),
        names::DISC_COUNT => Some(ItemKey::DiscTotal),
        names::COMMENT => Some(ItemKey::Comment),
        names::LYRICS => Some(ItemKey::Lyrics),
        _ => None,
    }
}

/// Parse "3", "3/12" or "2004-05-01" into their leading number.
fn leading_number(raw: &str) -> Option<u32> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl TagDescriptor {
    /// Read this tag from a file tag. `None` for virtual tags and absent or empty values.
    pub fn read_from(&'static self, file_tag: &FileTag) -> Option<Tag> {
        if self.kind == TagKind::Virtual {
            return None;
        }

        let value = if self.value_kind == ValueKind::Binary {
            file_tag
                .pictures()
                .iter()
                .find(|p| p.pic_type() == PictureType::CoverFront)
                .or_else(|| file_tag.pictures().first())
                .map(|p| TagValue::Binary(p.data().to_vec()))?
        } else {
            let key = item_key(self.name)?;
            match self.value_kind {
                ValueKind::Text => TagValue::Text(file_tag.get_string(key)?.trim().to_string()),
                ValueKind::List => TagValue::List(
                    file_tag
                        .get_strings(key)
                        .flat_map(|raw| raw.split(';'))
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect(),
                ),
                ValueKind::Number => TagValue::Number(leading_number(file_tag.get_string(key)?)?),
                ValueKind::Flag => TagValue::Flag(
                    file_tag
                        .get_string(key)
                        .is_some_and(|raw| matches!(raw.trim(), "1" | "true" | "yes")),
                ),
                ValueKind::Binary => return None,
            }
        };

        if !value.has_value() {
            return None;
        }
        Tag::new(self, value).ok()
    }

    /// Remove this tag from a file tag.
    pub fn clear_from(&self, file_tag: &mut FileTag) {
        match self.kind {
            TagKind::Virtual => {}
            TagKind::Persisted if self.value_kind == ValueKind::Binary => {
                file_tag.remove_picture_type(PictureType::CoverFront);
            }
            TagKind::Persisted => {
                if let Some(key) = item_key(self.name) {
                    file_tag.remove_key(key);
                }
            }
        }
    }
}

impl Tag {
    /// Write this tag into a file tag, replacing what was there. Virtual tags are ignored.
    pub fn apply_to(&self, file_tag: &mut FileTag) -> Result<()> {
        if !self.is_persisted() {
            return Ok(());
        }
        self.descriptor().clear_from(file_tag);
        if !self.has_value() {
            return Ok(());
        }

        if let TagValue::Binary(bytes) = self.value() {
            let mut picture = Picture::from_reader(&mut bytes.as_slice())?;
            picture.set_pic_type(PictureType::CoverFront);
            file_tag.push_picture(picture);
            return Ok(());
        }

        let Some(key) = item_key(self.name()) else {
            debug!("Tag '{}' has no file mapping, skipping", self.name());
            return Ok(());
        };
        match self.value() {
            TagValue::Text(text) => {
                file_tag.insert_text(key, text.trim().to_string());
            }
            TagValue::List(items) => {
                for item in items.iter().filter(|item| !item.trim().is_empty()) {
                    file_tag.push(TagItem::new(
                        key.clone(),
                        ItemValue::Text(item.trim().to_string()),
                    ));
                }
            }
            TagValue::Number(n) => {
                file_tag.insert_text(key, n.to_string());
            }
            TagValue::Flag(flag) => {
                file_tag.insert_text(key, if *flag { "1" } else { "0" }.to_string());
            }
            TagValue::Binary(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagRegistry;
    use lofty::tag::TagType;

    fn registry() -> &'static TagRegistry {
        TagRegistry::standard()
    }

    #[test]
    fn text_and_number_round_trip_through_a_file_tag() {
        let mut file_tag = FileTag::new(TagType::VorbisComments);
        registry()
            .create(names::TITLE, "Song")
            .unwrap()
            .apply_to(&mut file_tag)
            .unwrap();
        registry()
            .create(names::TRACK, 4u32)
            .unwrap()
            .apply_to(&mut file_tag)
            .unwrap();

        let title = registry().require(names::TITLE).unwrap().read_from(&file_tag);
        let track = registry().require(names::TRACK).unwrap().read_from(&file_tag);
        assert_eq!(title.unwrap().value(), &TagValue::from("Song"));
        assert_eq!(track.unwrap().value(), &TagValue::Number(4));
    }

    #[test]
    fn list_values_become_separate_items() {
        let mut file_tag = FileTag::new(TagType::VorbisComments);
        registry()
            .create(names::PERFORMERS, vec!["A", "B"])
            .unwrap()
            .apply_to(&mut file_tag)
            .unwrap();

        let read = registry()
            .require(names::PERFORMERS)
            .unwrap()
            .read_from(&file_tag)
            .unwrap();
        assert_eq!(read.value(), &TagValue::from(vec!["A", "B"]));
    }

    #[test]
    fn virtual_tags_never_touch_the_file() {
        let mut file_tag = FileTag::new(TagType::VorbisComments);
        registry()
            .create(names::SOURCE, "filename")
            .unwrap()
            .apply_to(&mut file_tag)
            .unwrap();
        assert_eq!(file_tag.item_count(), 0);
        assert!(registry().require(names::SOURCE).unwrap().read_from(&file_tag).is_none());
    }

    #[test]
    fn leading_number_handles_common_formats() {
        assert_eq!(leading_number("3/12"), Some(3));
        assert_eq!(leading_number(" 2004-05-01"), Some(2004));
        assert_eq!(leading_number("n/a"), None);
    }
}
