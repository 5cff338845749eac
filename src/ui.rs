use poi_map::boundary::BoundaryStatus;
use poi_map::braille::BrailleCanvas;
use poi_map::map::{MapLayers, MarkerGlyph};
use poi_map::surface::Emphasis;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Widget, Wrap},
    Frame,
};

use crate::app::{App, InputMode};

const PANEL_WIDTH: u16 = 38;
/// Rows of the side panel reserved for the selected point's details
const DETAIL_HEIGHT: u16 = 12;

pub struct AppLayout {
    pub map: Rect,
    pub map_inner: Rect,
    pub list: Rect,
    pub details: Rect,
    pub status: Rect,
}

/// Split the terminal into map pane, side panel and status bar
pub fn layout(area: Rect) -> AppLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(PANEL_WIDTH)])
        .split(rows[0]);
    let panel = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(DETAIL_HEIGHT)])
        .split(cols[1]);

    AppLayout {
        map: cols[0],
        map_inner: Block::default().borders(Borders::ALL).inner(cols[0]),
        list: panel[0],
        details: panel[1],
        status: rows[1],
    }
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let layout = layout(frame.area());
    render_map(frame, app, &layout);
    render_list(frame, app, layout.list);
    render_details(frame, app, layout.details);
    render_status_bar(frame, app, layout.status);
}

fn render_map(frame: &mut Frame, app: &App, layout: &AppLayout) {
    let title = match app.coordinator.boundary().geometry.as_ref().and_then(|b| b.name.clone()) {
        Some(name) => format!(" Map · {name} "),
        None => " Map ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    frame.render_widget(block, layout.map);

    let inner = layout.map_inner;
    let layers = app
        .coordinator
        .surface()
        .render(inner.width as usize, inner.height as usize, &app.viewport);

    frame.render_widget(
        MapWidget {
            layers,
            cursor: app.mouse_cell(),
        },
        inner,
    );
}

/// Braille layers with marker glyphs and labels overlaid
struct MapWidget {
    layers: MapLayers,
    cursor: Option<(u16, u16)>,
}

impl MapWidget {
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for row in 0..canvas.rows().min(area.height as usize) {
            for col in 0..canvas.cols().min(area.width as usize) {
                if let Some(ch) = canvas.glyph(col, row) {
                    buf[(area.x + col as u16, area.y + row as u16)]
                        .set_char(ch)
                        .set_fg(color);
                }
            }
        }
    }

    fn render_marker(marker: &MarkerGlyph, area: Rect, buf: &mut Buffer) {
        let (glyph, color) = match marker.emphasis {
            Emphasis::Normal => ('●', Color::White),
            Emphasis::Hovered => ('◉', Color::LightCyan),
            Emphasis::Selected => ('★', Color::LightYellow),
        };
        let x = area.x + marker.col;
        let y = area.y + marker.row;
        buf[(x, y)].set_char(glyph).set_fg(color);

        let Some(ref label) = marker.label else {
            return;
        };
        let style = match marker.emphasis {
            Emphasis::Normal => Style::default().fg(Color::Gray),
            _ => Style::default().fg(color).add_modifier(Modifier::BOLD),
        };
        let room = area.width.saturating_sub(marker.col + 2) as usize;
        for (i, ch) in label.chars().take(room.min(24)).enumerate() {
            buf[(x + 2 + i as u16, y)].set_char(ch).set_style(style);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Self::render_layer(&self.layers.basemap, Color::DarkGray, area, buf);
        Self::render_layer(&self.layers.boundary, Color::Yellow, area, buf);

        for marker in &self.layers.markers {
            Self::render_marker(marker, area, buf);
        }

        if let Some((cx, cy)) = self.cursor {
            if cx < area.width && cy < area.height {
                buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let points = app.active_points();
    let selected = app.coordinator.selection().selected_id;

    let items: Vec<ListItem> = points
        .iter()
        .map(|p| {
            let mark = if selected.as_ref() == Some(&p.id) { "★ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(mark, Style::default().fg(Color::LightYellow)),
                Span::styled(p.city.clone(), Style::default().fg(Color::White)),
                Span::styled(format!("  {}", p.category), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} · {} ", app.coordinator.filter(), points.len()));

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let mut state = ListState::default();
    if !points.is_empty() {
        state.select(Some(app.list_cursor.min(points.len() - 1)));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Details ");

    let text = match app.coordinator.selected_point() {
        Some(p) => Text::from(vec![
            Line::from(Span::styled(
                format!("{} {}", p.city, p.localized_name),
                Style::default().fg(Color::LightYellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("{} · {}", p.region, p.category),
                Style::default().fg(Color::Cyan),
            )),
            Line::from(""),
            Line::from(p.summary.as_str()),
        ]),
        None => Text::from(Span::styled(
            "Enter or click a marker to select",
            Style::default().fg(Color::DarkGray),
        )),
    };

    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let boundary = app.coordinator.boundary();
    let (boundary_text, boundary_color) = match boundary.status {
        BoundaryStatus::Idle => ("outline -".to_string(), Color::DarkGray),
        BoundaryStatus::Loading => ("outline …".to_string(), Color::Yellow),
        BoundaryStatus::Loaded => ("outline ✓".to_string(), Color::Green),
        BoundaryStatus::Error => ("outline ✗".to_string(), Color::Red),
    };

    let mut spans = vec![];
    match app.mode {
        InputMode::Search => {
            spans.push(Span::styled(" /", Style::default().fg(Color::Yellow)));
            spans.push(Span::styled(
                format!("{}▏", app.search_input),
                Style::default().fg(Color::White),
            ));
        }
        InputMode::Normal => {
            spans.push(Span::styled(" ", Style::default()));
        }
    }

    spans.extend([
        Span::styled(" ", Style::default()),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(boundary_text, Style::default().fg(boundary_color)),
    ]);

    if let Some(ref notice) = app.notice {
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(notice.clone(), Style::default().fg(Color::Magenta)));
    }

    spans.push(Span::styled(
        " | /:search [ ]:city 1-9:category x:clear g:locate q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
