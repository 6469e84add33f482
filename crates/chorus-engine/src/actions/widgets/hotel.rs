use std::sync::Arc;

use crate::actions::widgets::{GenericHttpWidget, Widget, WidgetBackend};

pub fn hotel_widget(backend: Arc<dyn WidgetBackend>) -> impl Widget {
    GenericHttpWidget::new("hotel", |c| c.widgets.show_hotel_widget, backend)
}
