use std::sync::Arc;

use crate::actions::widgets::{GenericHttpWidget, Widget, WidgetBackend};

pub fn place_widget(backend: Arc<dyn WidgetBackend>) -> impl Widget {
    GenericHttpWidget::new("place", |c| c.widgets.show_place_widget, backend)
}
