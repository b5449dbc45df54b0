table! {
    usgs (time) {
        time -> Timestamp,
        stream_flow -> Float8,
        gage_height -> Float8,
    }
}

table! {
    hobolink (time) {
        time -> Timestamp,
        pressure -> Float8,
        par -> Float8,
        rain -> Float8,
        rh -> Float8,
        dew_point -> Float8,
        wind_speed -> Float8,
        gust_speed -> Float8,
        wind_dir -> Float8,
        water_temp -> Float8,
        air_temp -> Float8,
    }
}

table! {
    processed_data (reach, time) {
        reach -> Int4,
        time -> Timestamp,
        rain_0_to_24h_sum -> Float8,
        rain_0_to_48h_sum -> Float8,
        rain_0_to_72h_sum -> Float8,
        stream_flow -> Float8,
        gage_height -> Float8,
        par -> Float8,
        water_temp -> Float8,
    }
}

table! {
    model_outputs (reach, time) {
        reach -> Int4,
        time -> Timestamp,
        log_odds -> Float8,
        probability -> Float8,
        safe -> Bool,
    }
}

table! {
    boathouses (boathouse) {
        boathouse -> Varchar,
        reach -> Int4,
        latitude -> Float8,
        longitude -> Float8,
    }
}

table! {
    manual_overrides (id) {
        id -> Int4,
        boathouse -> Varchar,
        start_time -> Timestamp,
        end_time -> Timestamp,
        reason -> Varchar,
    }
}
