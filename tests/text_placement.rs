use ab_glyph::FontArc;
use aintpro::components::colors::WHITE;
use aintpro::components::tools::{Tool, ToolProperties};
use aintpro::ops::text::{load_system_font, TextKey};
use aintpro::ops::transform::FlipAxis;
use aintpro::{EditorSession, EngineSettings, PointerEvent};
use image::RgbaImage;

fn system_font() -> Option<FontArc> {
    match load_system_font("DejaVu Sans") {
        Ok(font) => Some(font),
        Err(e) => {
            eprintln!("skipping: no system font available ({})", e);
            None
        }
    }
}

fn text_session(w: u32, h: u32, size: f32, font: FontArc) -> EditorSession {
    let settings = EngineSettings {
        canvas_width: w,
        canvas_height: h,
        ..EngineSettings::default()
    };
    let mut session = EditorSession::new(&settings).unwrap();
    session.set_font(font);
    let props = ToolProperties {
        size,
        ..session.properties().clone()
    };
    session.set_properties(props);
    session.set_tool(Tool::Text).unwrap();
    session
}

/// Rows holding at least one non-white pixel, top to bottom.
fn ink_rows(img: &RgbaImage) -> Vec<u32> {
    (0..img.height())
        .filter(|&y| (0..img.width()).any(|x| *img.get_pixel(x, y) != WHITE))
        .collect()
}

/// First row of each vertically separated run of ink.
fn block_tops(rows: &[u32]) -> Vec<u32> {
    let mut tops = Vec::new();
    let mut prev: Option<u32> = None;
    for &y in rows {
        if prev.is_none_or(|p| y > p + 1) {
            tops.push(y);
        }
        prev = Some(y);
    }
    tops
}

fn type_and_commit(session: &mut EditorSession, at: (f32, f32), text: &str) -> bool {
    session.pointer_down(PointerEvent::primary(at.0, at.1)).unwrap();
    session.text_input(text);
    session.text_key(TextKey::Enter { shift: false }).unwrap()
}

#[test]
fn test_text_commit_records_one_entry_below_anchor() {
    let Some(font) = system_font() else { return };
    let mut session = text_session(120, 80, 5.0, font);
    assert_eq!(session.properties().font_size(), 20.0);

    assert!(type_and_commit(&mut session, (10.0, 30.0), "Hello"));
    assert!(!session.is_editing_text());
    assert_eq!(session.history().undo_history(), vec!["Text", "New Canvas"]);

    let rows = ink_rows(&session.to_rgba_image());
    assert!(!rows.is_empty(), "nothing was drawn");
    // Top-aligned: the draft's anchor is the top of the line box.
    assert!(rows[0] >= 30, "ink starts above the anchor at row {}", rows[0]);
    assert!(rows[0] < 30 + 10, "ink starts too low at row {}", rows[0]);
    assert!(*rows.last().unwrap() < 30 + 24);
}

#[test]
fn test_second_line_sits_one_and_a_fifth_sizes_lower() {
    let Some(font) = system_font() else { return };
    let mut session = text_session(120, 120, 5.0, font);

    session.pointer_down(PointerEvent::primary(10.0, 10.0)).unwrap();
    session.text_input("H");
    session.text_key(TextKey::Enter { shift: true }).unwrap();
    session.text_input("H");
    assert!(session.text_key(TextKey::Enter { shift: false }).unwrap());
    assert_eq!(session.history().len(), 2);

    let tops = block_tops(&ink_rows(&session.to_rgba_image()));
    assert_eq!(tops.len(), 2, "expected two lines, got tops {:?}", tops);
    let pitch = tops[1] as i64 - tops[0] as i64;
    assert!((pitch - 24).abs() <= 1, "line pitch {}", pitch);
}

#[test]
fn test_font_size_never_drops_below_twelve() {
    let Some(font) = system_font() else { return };
    let render = |size: f32| {
        let mut session = text_session(160, 120, size, font.clone());
        assert!(type_and_commit(&mut session, (5.0, 5.0), "H"));
        session.to_rgba_image()
    };

    // Sizes 1 and 2 both clamp to a 12 px font.
    assert_eq!(render(1.0), render(2.0));

    let height = |img: &RgbaImage| ink_rows(img).len() as f32;
    let small = height(&render(5.0));
    let large = height(&render(10.0));
    let ratio = large / small;
    assert!((1.7..=2.3).contains(&ratio), "20px vs 40px ink heights {} / {}", small, large);
}

#[test]
fn test_switching_tool_commits_typed_text() {
    let Some(font) = system_font() else { return };
    let mut session = text_session(80, 60, 5.0, font);
    session.pointer_down(PointerEvent::primary(5.0, 5.0)).unwrap();
    session.text_input("Hi");
    assert!(session.is_editing_text());

    session.set_tool(Tool::Brush).unwrap();
    assert!(!session.is_editing_text());
    assert_eq!(session.history().undo_description(), Some("Text"));
    assert!(!ink_rows(&session.to_rgba_image()).is_empty());
}

#[test]
fn test_flip_commits_open_text_first() {
    let Some(font) = system_font() else { return };
    let mut session = text_session(120, 60, 5.0, font);
    session.pointer_down(PointerEvent::primary(5.0, 5.0)).unwrap();
    session.text_input("Hello");

    session.flip(FlipAxis::Horizontal).unwrap();
    assert!(!session.is_editing_text());
    assert_eq!(
        session.history().undo_history(),
        vec!["Flip Horizontal", "Text", "New Canvas"]
    );
    // The text started near the left edge, so after the flip it sits on the right.
    let img = session.to_rgba_image();
    let inked_cols: Vec<u32> = (0..img.width())
        .filter(|&x| (0..img.height()).any(|y| *img.get_pixel(x, y) != WHITE))
        .collect();
    assert!(!inked_cols.is_empty());
    assert!(inked_cols[0] > 40, "leftmost ink column {}", inked_cols[0]);
}

#[test]
fn test_undo_while_typing_reverts_the_draft() {
    let Some(font) = system_font() else { return };
    let mut session = text_session(80, 60, 5.0, font);
    let blank = session.to_rgba_image();
    session.pointer_down(PointerEvent::primary(5.0, 5.0)).unwrap();
    session.text_input("Hi");

    assert!(session.undo().unwrap());
    assert!(!session.is_editing_text());
    assert_eq!(session.to_rgba_image(), blank);
    assert_eq!(session.history().redo_description(), Some("Text"));

    assert!(session.redo().unwrap());
    assert_ne!(session.to_rgba_image(), blank);
}
